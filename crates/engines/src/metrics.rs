//! Per-engine metrics, readable back by operators and exported through
//! the Prometheus facade

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// Metric names exported through the `metrics` facade
pub mod names {
    pub const ENGINE_CALLS: &str = "engine_calls_total";
    pub const ENGINE_CALL_DURATION: &str = "engine_call_duration_seconds";
    pub const ENGINE_CIRCUIT_OPENS: &str = "engine_circuit_opens_total";
}

/// Aggregate timing and counts for one operation of one engine
#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationMetrics {
    pub total_calls: u64,
    pub success_count: u64,
    pub fail_count: u64,
    pub total_duration_ms: u64,
}

/// Everything the collector tracks for one engine
#[derive(Debug, Clone, Serialize)]
pub struct EngineMetrics {
    pub total_calls: u64,
    pub success_count: u64,
    pub fail_count: u64,
    pub total_duration_ms: u64,
    pub min_duration_ms: Option<u64>,
    pub max_duration_ms: u64,
    pub circuit_state: String,
    pub circuit_open_count: u64,
    pub last_call_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub operations: HashMap<String, OperationMetrics>,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self {
            total_calls: 0,
            success_count: 0,
            fail_count: 0,
            total_duration_ms: 0,
            min_duration_ms: None,
            max_duration_ms: 0,
            circuit_state: "closed".to_string(),
            circuit_open_count: 0,
            last_call_at: None,
            last_error: None,
            operations: HashMap::new(),
        }
    }
}

impl EngineMetrics {
    pub fn avg_duration_ms(&self) -> u64 {
        if self.total_calls == 0 {
            0
        } else {
            self.total_duration_ms / self.total_calls
        }
    }
}

/// Collector over every hosted engine
#[derive(Default)]
pub struct MetricsCollector {
    inner: RwLock<HashMap<String, EngineMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed (or failed) engine call
    pub fn record_call(
        &self,
        engine_id: &str,
        operation: &str,
        duration: Duration,
        success: bool,
        error: Option<&str>,
    ) {
        let duration_ms = duration.as_millis() as u64;
        let mut inner = self.inner.write().unwrap();
        let entry = inner.entry(engine_id.to_string()).or_default();

        entry.total_calls += 1;
        entry.total_duration_ms += duration_ms;
        entry.max_duration_ms = entry.max_duration_ms.max(duration_ms);
        entry.min_duration_ms = Some(match entry.min_duration_ms {
            Some(min) => min.min(duration_ms),
            None => duration_ms,
        });
        entry.last_call_at = Some(Utc::now());
        if success {
            entry.success_count += 1;
        } else {
            entry.fail_count += 1;
            entry.last_error = error.map(|e| e.to_string());
        }

        let op = entry.operations.entry(operation.to_string()).or_default();
        op.total_calls += 1;
        op.total_duration_ms += duration_ms;
        if success {
            op.success_count += 1;
        } else {
            op.fail_count += 1;
        }

        let status = if success { "success" } else { "failure" };
        counter!(
            names::ENGINE_CALLS,
            "engine" => engine_id.to_string(),
            "operation" => operation.to_string(),
            "status" => status
        )
        .increment(1);
        histogram!(names::ENGINE_CALL_DURATION, "engine" => engine_id.to_string())
            .record(duration.as_secs_f64());
    }

    /// Record the breaker's state after a call; entering "open" counts as
    /// one circuit-open event
    pub fn record_circuit_state(&self, engine_id: &str, state: &str) {
        let mut inner = self.inner.write().unwrap();
        let entry = inner.entry(engine_id.to_string()).or_default();
        if entry.circuit_state != state {
            if state == "open" {
                entry.circuit_open_count += 1;
                counter!(names::ENGINE_CIRCUIT_OPENS, "engine" => engine_id.to_string())
                    .increment(1);
            }
            entry.circuit_state = state.to_string();
        }
    }

    pub fn snapshot(&self, engine_id: &str) -> Option<EngineMetrics> {
        self.inner.read().unwrap().get(engine_id).cloned()
    }

    pub fn all(&self) -> HashMap<String, EngineMetrics> {
        self.inner.read().unwrap().clone()
    }
}
