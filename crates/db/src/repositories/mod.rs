pub mod calendar_repo;
pub mod conflict_repo;
pub mod credential_repo;
pub mod outbox_repo;
pub mod schedule_repo;
pub mod sync_state_repo;

pub use calendar_repo::CalendarRepository;
pub use conflict_repo::ConflictRepository;
pub use credential_repo::CredentialRepository;
pub use outbox_repo::OutboxRepository;
pub use schedule_repo::ScheduleRepository;
pub use sync_state_repo::SyncStateRepository;
