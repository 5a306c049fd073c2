//! Circuit breaker guarding engine calls.
//!
//! State machine: closed goes open after `failure_threshold` consecutive
//! failures; open goes half-open after `timeout`; half-open closes on a
//! successful probe and reopens on any failure. Consecutive-failure
//! counting resets on success and at `interval` boundaries.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Probes allowed while half-open
    pub max_requests: u32,
    /// Rolling window after which the failure count resets
    pub interval: Duration,
    /// How long the circuit stays open before allowing probes
    pub timeout: Duration,
    /// Consecutive failures that trip the circuit
    pub failure_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_requests: 1,
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(30),
            failure_threshold: 5,
        }
    }
}

#[derive(Debug)]
enum BreakerState {
    Closed {
        consecutive_failures: u32,
        window_start: Instant,
    },
    Open {
        opened_at: Instant,
    },
    HalfOpen {
        probes_in_flight: u32,
    },
}

/// Result of a guarded call
#[derive(Debug, Error)]
pub enum BreakerError {
    #[error("circuit open")]
    Open,
    #[error(transparent)]
    Inner(EngineError),
}

pub struct CircuitBreaker {
    config: BreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState::Closed {
                consecutive_failures: 0,
                window_start: Instant::now(),
            }),
        }
    }

    /// Run one call through the breaker. Open-circuit calls return
    /// immediately without invoking the operation.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, BreakerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, EngineError>>,
    {
        self.before_call()?;
        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(BreakerError::Inner(e))
            }
        }
    }

    /// Current state name: "closed", "open" or "half-open"
    pub fn state_name(&self) -> &'static str {
        let mut state = self.state.lock().unwrap();
        self.refresh(&mut state);
        match *state {
            BreakerState::Closed { .. } => "closed",
            BreakerState::Open { .. } => "open",
            BreakerState::HalfOpen { .. } => "half-open",
        }
    }

    /// Force the breaker closed
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        *state = BreakerState::Closed {
            consecutive_failures: 0,
            window_start: Instant::now(),
        };
    }

    /// Lazy open-to-half-open transition once the timeout elapsed
    fn refresh(&self, state: &mut BreakerState) {
        if let BreakerState::Open { opened_at } = *state {
            if opened_at.elapsed() >= self.config.timeout {
                *state = BreakerState::HalfOpen {
                    probes_in_flight: 0,
                };
            }
        }
    }

    fn before_call(&self) -> Result<(), BreakerError> {
        let mut state = self.state.lock().unwrap();
        self.refresh(&mut state);
        match &mut *state {
            BreakerState::Closed {
                consecutive_failures,
                window_start,
            } => {
                if window_start.elapsed() >= self.config.interval {
                    *consecutive_failures = 0;
                    *window_start = Instant::now();
                }
                Ok(())
            }
            BreakerState::Open { .. } => Err(BreakerError::Open),
            BreakerState::HalfOpen { probes_in_flight } => {
                if *probes_in_flight >= self.config.max_requests {
                    return Err(BreakerError::Open);
                }
                *probes_in_flight += 1;
                Ok(())
            }
        }
    }

    fn on_success(&self) {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            BreakerState::Closed {
                consecutive_failures,
                ..
            } => *consecutive_failures = 0,
            BreakerState::HalfOpen { .. } => {
                *state = BreakerState::Closed {
                    consecutive_failures: 0,
                    window_start: Instant::now(),
                };
            }
            BreakerState::Open { .. } => {}
        }
    }

    fn on_failure(&self) {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            BreakerState::Closed {
                consecutive_failures,
                ..
            } => {
                *consecutive_failures += 1;
                if *consecutive_failures >= self.config.failure_threshold {
                    *state = BreakerState::Open {
                        opened_at: Instant::now(),
                    };
                }
            }
            BreakerState::HalfOpen { .. } => {
                *state = BreakerState::Open {
                    opened_at: Instant::now(),
                };
            }
            BreakerState::Open { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            max_requests: 1,
            interval: Duration::from_secs(60),
            timeout,
            failure_threshold: threshold,
        })
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), BreakerError> {
        breaker
            .execute(|| async { Err::<(), _>(EngineError::Execution("boom".to_string())) })
            .await
            .map(|_| ())
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<(), BreakerError> {
        breaker.execute(|| async { Ok(()) }).await
    }

    #[tokio::test]
    async fn test_opens_on_nth_consecutive_failure() {
        let breaker = breaker(3, Duration::from_millis(50));
        for _ in 0..2 {
            assert!(matches!(fail(&breaker).await, Err(BreakerError::Inner(_))));
            assert_eq!(breaker.state_name(), "closed");
        }
        assert!(matches!(fail(&breaker).await, Err(BreakerError::Inner(_))));
        assert_eq!(breaker.state_name(), "open");
    }

    #[tokio::test]
    async fn test_open_rejects_without_invoking() {
        let breaker = breaker(1, Duration::from_secs(60));
        fail(&breaker).await.ok();
        assert_eq!(breaker.state_name(), "open");

        let mut invoked = false;
        let result = breaker
            .execute(|| {
                invoked = true;
                async { Ok(()) }
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Open)));
        assert!(!invoked);
    }

    #[tokio::test]
    async fn test_half_open_probe_closes_on_success() {
        let breaker = breaker(1, Duration::from_millis(50));
        fail(&breaker).await.ok();
        assert_eq!(breaker.state_name(), "open");

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(breaker.state_name(), "half-open");
        assert!(succeed(&breaker).await.is_ok());
        assert_eq!(breaker.state_name(), "closed");
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = breaker(1, Duration::from_millis(10));
        fail(&breaker).await.ok();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(breaker.state_name(), "half-open");

        fail(&breaker).await.ok();
        assert_eq!(breaker.state_name(), "open");
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let breaker = breaker(3, Duration::from_secs(60));
        fail(&breaker).await.ok();
        fail(&breaker).await.ok();
        succeed(&breaker).await.unwrap();
        fail(&breaker).await.ok();
        fail(&breaker).await.ok();
        // Still closed: the counter restarted after the success
        assert_eq!(breaker.state_name(), "closed");
    }

    #[tokio::test]
    async fn test_reset_forces_closed() {
        let breaker = breaker(1, Duration::from_secs(60));
        fail(&breaker).await.ok();
        assert_eq!(breaker.state_name(), "open");
        breaker.reset();
        assert_eq!(breaker.state_name(), "closed");
        assert!(succeed(&breaker).await.is_ok());
    }
}
