pub mod conflict;
pub mod connect;
pub mod coordinator;
pub mod disconnect;
pub mod error;
pub mod import;
pub mod metrics;
pub mod store;
pub mod subscriber;

pub use conflict::{ConflictHandler, ConflictPolicy, EventDisposition};
pub use connect::{ConnectCommand, ConnectMultipleCommand, ConnectMultipleOutcome, ConnectService};
pub use coordinator::{MultiSyncResult, SyncCoordinator};
pub use disconnect::DisconnectService;
pub use error::{ServiceError, ServiceResult};
pub use import::{CycleSummary, ImportWorker, ImportWorkerConfig};
pub use store::{CalendarStore, ConflictStore, PgStore, ScheduleStore, SyncStateStore};
pub use subscriber::{BlockEventMessage, BlockEventSubscriber};
