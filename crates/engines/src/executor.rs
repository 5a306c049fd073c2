//! Supervised engine execution: breaker + deadline + metrics

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::breaker::{BreakerConfig, BreakerError, CircuitBreaker};
use crate::error::{EngineError, EngineResult};
use crate::metrics::MetricsCollector;
use crate::registry::EngineRegistry;
use crate::sdk::{EngineRequest, EngineResponse};

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Deadline applied when the caller does not pass one
    pub default_timeout: Duration,
    pub breaker: BreakerConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            breaker: BreakerConfig::default(),
        }
    }
}

/// Executes engine calls behind per-engine circuit breakers
pub struct EngineExecutor {
    registry: Arc<EngineRegistry>,
    collector: Arc<MetricsCollector>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    config: ExecutorConfig,
}

impl EngineExecutor {
    pub fn new(
        registry: Arc<EngineRegistry>,
        collector: Arc<MetricsCollector>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            registry,
            collector,
            breakers: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Execute one engine call with the given or default deadline.
    ///
    /// Registry errors pass through; an open circuit fails fast without
    /// reaching the engine.
    pub async fn execute(
        &self,
        engine_id: &str,
        request: EngineRequest,
        timeout: Option<Duration>,
    ) -> EngineResult<EngineResponse> {
        let engine = self.registry.get(engine_id)?;
        let breaker = self.breaker_for(engine_id);
        let deadline = timeout.unwrap_or(self.config.default_timeout);
        let operation = request.operation.clone();

        let started = Instant::now();
        let result = breaker
            .execute(|| async {
                match tokio::time::timeout(deadline, engine.execute(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(EngineError::Timeout(engine_id.to_string())),
                }
            })
            .await;
        let duration = started.elapsed();

        self.collector
            .record_circuit_state(engine_id, breaker.state_name());

        match result {
            Ok(response) => {
                self.collector
                    .record_call(engine_id, &operation, duration, true, None);
                debug!(engine = %engine_id, operation = %operation, ?duration, "engine call ok");
                Ok(response)
            }
            Err(BreakerError::Open) => Err(EngineError::CircuitOpen(engine_id.to_string())),
            Err(BreakerError::Inner(e)) => {
                self.collector.record_call(
                    engine_id,
                    &operation,
                    duration,
                    false,
                    Some(&e.to_string()),
                );
                Err(e)
            }
        }
    }

    /// Force an engine's breaker closed
    pub fn reset_circuit_breaker(&self, engine_id: &str) {
        if let Some(breaker) = self.breakers.read().unwrap().get(engine_id) {
            breaker.reset();
            self.collector.record_circuit_state(engine_id, "closed");
        }
    }

    /// Breaker state name, or "none" before the first call constructed one
    pub fn circuit_breaker_state(&self, engine_id: &str) -> String {
        self.breakers
            .read()
            .unwrap()
            .get(engine_id)
            .map(|b| b.state_name().to_string())
            .unwrap_or_else(|| "none".to_string())
    }

    fn breaker_for(&self, engine_id: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().unwrap().get(engine_id) {
            return breaker.clone();
        }
        let mut breakers = self.breakers.write().unwrap();
        breakers
            .entry(engine_id.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config.breaker.clone())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::{Engine, EngineKind, EngineMetadata};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FlakyEngine {
        should_fail: Arc<AtomicBool>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Engine for FlakyEngine {
        fn metadata(&self) -> EngineMetadata {
            EngineMetadata {
                id: "acme.flaky".to_string(),
                name: "Flaky".to_string(),
                version: "1.0.0".to_string(),
                kind: EngineKind::Priority,
                description: String::new(),
                capabilities: vec![],
                tags: vec![],
            }
        }

        async fn execute(&self, _request: EngineRequest) -> EngineResult<EngineResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.should_fail.load(Ordering::SeqCst) {
                Err(EngineError::Execution("downstream error".to_string()))
            } else {
                Ok(EngineResponse {
                    payload: json!({"ok": true}),
                })
            }
        }
    }

    struct SlowEngine;

    #[async_trait]
    impl Engine for SlowEngine {
        fn metadata(&self) -> EngineMetadata {
            EngineMetadata {
                id: "acme.slow".to_string(),
                name: "Slow".to_string(),
                version: "1.0.0".to_string(),
                kind: EngineKind::Automation,
                description: String::new(),
                capabilities: vec![],
                tags: vec![],
            }
        }

        async fn execute(&self, _request: EngineRequest) -> EngineResult<EngineResponse> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(EngineResponse {
                payload: json!({}),
            })
        }
    }

    fn executor_with(
        engine: Arc<dyn Engine>,
        breaker: BreakerConfig,
    ) -> (EngineExecutor, Arc<MetricsCollector>) {
        let registry = Arc::new(EngineRegistry::new());
        registry.register_builtin(engine).unwrap();
        let collector = Arc::new(MetricsCollector::new());
        let executor = EngineExecutor::new(
            registry,
            collector.clone(),
            ExecutorConfig {
                default_timeout: Duration::from_millis(200),
                breaker,
            },
        );
        (executor, collector)
    }

    fn request() -> EngineRequest {
        EngineRequest::new("score", json!({"items": []}))
    }

    #[tokio::test]
    async fn test_circuit_opens_and_rejects_without_reaching_engine() {
        let should_fail = Arc::new(AtomicBool::new(true));
        let calls = Arc::new(AtomicUsize::new(0));
        let (executor, collector) = executor_with(
            Arc::new(FlakyEngine {
                should_fail: should_fail.clone(),
                calls: calls.clone(),
            }),
            BreakerConfig {
                max_requests: 1,
                interval: Duration::from_secs(60),
                timeout: Duration::from_millis(50),
                failure_threshold: 3,
            },
        );

        for _ in 0..3 {
            let result = executor.execute("acme.flaky", request(), None).await;
            assert!(matches!(result, Err(EngineError::Execution(_))));
        }
        assert_eq!(executor.circuit_breaker_state("acme.flaky"), "open");
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // Open circuit: rejected synchronously, engine never invoked
        let result = executor.execute("acme.flaky", request(), None).await;
        assert!(matches!(result, Err(EngineError::CircuitOpen(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // After the open timeout, a successful probe closes the circuit
        should_fail.store(false, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(60));
        let result = executor.execute("acme.flaky", request(), None).await;
        assert!(result.is_ok());
        assert_eq!(executor.circuit_breaker_state("acme.flaky"), "closed");

        let metrics = collector.snapshot("acme.flaky").unwrap();
        assert_eq!(metrics.circuit_open_count, 1);
        assert_eq!(metrics.fail_count, 3);
        assert_eq!(metrics.success_count, 1);
    }

    #[tokio::test]
    async fn test_registry_errors_pass_through() {
        let (executor, _) = executor_with(
            Arc::new(FlakyEngine {
                should_fail: Arc::new(AtomicBool::new(false)),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            BreakerConfig::default(),
        );
        let result = executor.execute("missing", request(), None).await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
        // No breaker gets constructed for an unknown engine
        assert_eq!(executor.circuit_breaker_state("missing"), "none");
    }

    #[tokio::test]
    async fn test_deadline_produces_timeout() {
        let (executor, collector) =
            executor_with(Arc::new(SlowEngine), BreakerConfig::default());
        let result = executor
            .execute("acme.slow", request(), Some(Duration::from_millis(20)))
            .await;
        assert!(matches!(result, Err(EngineError::Timeout(_))));

        let metrics = collector.snapshot("acme.slow").unwrap();
        assert_eq!(metrics.fail_count, 1);
    }

    #[tokio::test]
    async fn test_reset_circuit_breaker() {
        let (executor, _) = executor_with(
            Arc::new(FlakyEngine {
                should_fail: Arc::new(AtomicBool::new(true)),
                calls: Arc::new(AtomicUsize::new(0)),
            }),
            BreakerConfig {
                max_requests: 1,
                interval: Duration::from_secs(60),
                timeout: Duration::from_secs(60),
                failure_threshold: 1,
            },
        );

        executor.execute("acme.flaky", request(), None).await.ok();
        assert_eq!(executor.circuit_breaker_state("acme.flaky"), "open");
        executor.reset_circuit_breaker("acme.flaky");
        assert_eq!(executor.circuit_breaker_state("acme.flaky"), "closed");
    }
}
