pub mod breaker;
pub mod builtin;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod manifest;
pub mod metrics;
pub mod registry;
pub mod sdk;

pub use breaker::{BreakerConfig, CircuitBreaker};
pub use builtin::WeightedPriorityEngine;
pub use discovery::{discover, discover_in, DiscoveryResult};
pub use error::{EngineError, EngineResult};
pub use executor::{EngineExecutor, ExecutorConfig};
pub use manifest::Manifest;
pub use metrics::{EngineMetrics, MetricsCollector};
pub use registry::{EngineRegistry, EngineStatus};
pub use sdk::{
    ConfigSchema, Engine, EngineKind, EngineMetadata, EngineRequest, EngineResponse,
    HealthStatus, SDK_VERSION,
};
