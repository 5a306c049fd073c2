//! Built-in engines shipped with the runtime

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{EngineError, EngineResult};
use crate::sdk::{
    ConfigSchema, Engine, EngineKind, EngineMetadata, EngineRequest, EngineResponse, SDK_VERSION,
};

pub const BUILTIN_PRIORITY_ID: &str = "orbita.priority-weighted";

#[derive(Debug, Deserialize)]
struct ScoreItem {
    id: String,
    #[serde(default)]
    importance: u8,
    #[serde(default)]
    urgency: u8,
}

#[derive(Debug, Deserialize)]
struct ScorePayload {
    items: Vec<ScoreItem>,
}

/// Weighted priority scoring over (importance, urgency) pairs.
///
/// Scores land in [0, 100]; the quadrant labels follow the usual
/// urgent/important split.
#[derive(Debug, Default)]
pub struct WeightedPriorityEngine;

impl WeightedPriorityEngine {
    fn score(importance: u8, urgency: u8) -> u32 {
        let importance = importance.min(10) as u32;
        let urgency = urgency.min(10) as u32;
        importance * 6 + urgency * 4
    }

    fn quadrant(importance: u8, urgency: u8) -> &'static str {
        match (importance >= 5, urgency >= 5) {
            (true, true) => "do_first",
            (true, false) => "schedule",
            (false, true) => "delegate",
            (false, false) => "eliminate",
        }
    }
}

#[async_trait]
impl Engine for WeightedPriorityEngine {
    fn metadata(&self) -> EngineMetadata {
        EngineMetadata {
            id: BUILTIN_PRIORITY_ID.to_string(),
            name: "Weighted Priority".to_string(),
            version: SDK_VERSION.to_string(),
            kind: EngineKind::Priority,
            description: "Scores items by weighted importance and urgency".to_string(),
            capabilities: vec!["score".to_string()],
            tags: vec!["builtin".to_string()],
        }
    }

    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema {
            schema: json!({
                "type": "object",
                "properties": {
                    "importance_weight": { "type": "number" },
                    "urgency_weight": { "type": "number" }
                }
            }),
            defaults: json!({ "importance_weight": 6, "urgency_weight": 4 }),
        }
    }

    async fn execute(&self, request: EngineRequest) -> EngineResult<EngineResponse> {
        if request.operation != "score" {
            return Err(EngineError::Execution(format!(
                "unsupported operation: {}",
                request.operation
            )));
        }
        let payload: ScorePayload = serde_json::from_value(request.payload)
            .map_err(|e| EngineError::Execution(format!("bad payload: {}", e)))?;

        let scores: Vec<serde_json::Value> = payload
            .items
            .iter()
            .map(|item| {
                json!({
                    "id": item.id,
                    "score": Self::score(item.importance, item.urgency),
                    "quadrant": Self::quadrant(item.importance, item.urgency),
                })
            })
            .collect();

        Ok(EngineResponse {
            payload: json!({ "scores": scores }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_score_and_quadrants() {
        let engine = WeightedPriorityEngine;
        let response = engine
            .execute(EngineRequest::new(
                "score",
                json!({
                    "items": [
                        { "id": "a", "importance": 8, "urgency": 9 },
                        { "id": "b", "importance": 7, "urgency": 2 },
                        { "id": "c", "importance": 1, "urgency": 8 },
                        { "id": "d" }
                    ]
                }),
            ))
            .await
            .unwrap();

        let scores = response.payload["scores"].as_array().unwrap();
        assert_eq!(scores.len(), 4);
        assert_eq!(scores[0]["score"], 84);
        assert_eq!(scores[0]["quadrant"], "do_first");
        assert_eq!(scores[1]["quadrant"], "schedule");
        assert_eq!(scores[2]["quadrant"], "delegate");
        assert_eq!(scores[3]["quadrant"], "eliminate");
        assert_eq!(scores[3]["score"], 0);
    }

    #[tokio::test]
    async fn test_unknown_operation_rejected() {
        let engine = WeightedPriorityEngine;
        let result = engine
            .execute(EngineRequest::new("classify", json!({})))
            .await;
        assert!(matches!(result, Err(EngineError::Execution(_))));
    }

    #[test]
    fn test_metadata_is_priority_kind() {
        let engine = WeightedPriorityEngine;
        let metadata = engine.metadata();
        assert_eq!(metadata.id, BUILTIN_PRIORITY_ID);
        assert_eq!(metadata.kind, EngineKind::Priority);
    }
}
