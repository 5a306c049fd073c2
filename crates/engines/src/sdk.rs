//! Contract between the runtime and decision engines

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// SDK version this runtime provides to engines
pub const SDK_VERSION: &str = "1.2.0";

/// Decision-engine families hosted by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Scheduler,
    Priority,
    Classifier,
    Automation,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Scheduler => write!(f, "scheduler"),
            EngineKind::Priority => write!(f, "priority"),
            EngineKind::Classifier => write!(f, "classifier"),
            EngineKind::Automation => write!(f, "automation"),
        }
    }
}

impl std::str::FromStr for EngineKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduler" => Ok(EngineKind::Scheduler),
            "priority" => Ok(EngineKind::Priority),
            "classifier" => Ok(EngineKind::Classifier),
            "automation" => Ok(EngineKind::Automation),
            other => Err(EngineError::UnknownKind(other.to_string())),
        }
    }
}

/// Descriptive metadata an engine reports about itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineMetadata {
    pub id: String,
    pub name: String,
    pub version: String,
    pub kind: EngineKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Health report from an engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    #[serde(default)]
    pub message: String,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: String::new(),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: message.into(),
        }
    }
}

/// JSON schema plus defaults describing an engine's configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub schema: Value,
    pub defaults: Value,
}

/// One call into an engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineRequest {
    pub operation: String,
    pub payload: Value,
    #[serde(default)]
    pub config: Value,
}

impl EngineRequest {
    pub fn new(operation: impl Into<String>, payload: Value) -> Self {
        Self {
            operation: operation.into(),
            payload,
            config: Value::Null,
        }
    }
}

/// An engine's reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineResponse {
    pub payload: Value,
}

/// A hosted decision engine
#[async_trait]
pub trait Engine: Send + Sync {
    fn metadata(&self) -> EngineMetadata;

    fn config_schema(&self) -> ConfigSchema {
        ConfigSchema::default()
    }

    async fn execute(&self, request: EngineRequest) -> EngineResult<EngineResponse>;

    async fn health(&self) -> HealthStatus {
        HealthStatus::healthy()
    }

    async fn shutdown(&self) -> EngineResult<()> {
        Ok(())
    }
}

/// Check that this runtime satisfies an engine's minimum SDK version:
/// majors must match and the runtime's minor must be at least the
/// required minor.
pub fn sdk_compatible(minimum: &str) -> EngineResult<()> {
    let required = semver::Version::parse(minimum)
        .map_err(|e| EngineError::InvalidManifest(format!("bad min SDK version: {}", e)))?;
    let current = semver::Version::parse(SDK_VERSION)
        .map_err(|e| EngineError::InvalidManifest(format!("bad SDK version: {}", e)))?;

    if required.major != current.major || required.minor > current.minor {
        return Err(EngineError::IncompatibleSdk {
            required: minimum.to_string(),
            current: SDK_VERSION.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            EngineKind::Scheduler,
            EngineKind::Priority,
            EngineKind::Classifier,
            EngineKind::Automation,
        ] {
            let parsed: EngineKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result = "optimizer".parse::<EngineKind>();
        assert!(matches!(result, Err(EngineError::UnknownKind(_))));
    }

    #[test]
    fn test_sdk_compatibility_rule() {
        assert!(sdk_compatible("1.0.0").is_ok());
        assert!(sdk_compatible("1.2.0").is_ok());
        assert!(sdk_compatible("1.2.9").is_ok());
        assert!(sdk_compatible("1.3.0").is_err());
        assert!(sdk_compatible("0.9.0").is_err());
        assert!(sdk_compatible("2.0.0").is_err());
        assert!(sdk_compatible("not-a-version").is_err());
    }
}
