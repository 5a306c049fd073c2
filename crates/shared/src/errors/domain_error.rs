use thiserror::Error;

/// Domain-level errors representing business rule violations
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("User id must not be empty")]
    EmptyUserId,

    #[error("External calendar id must not be empty")]
    EmptyExternalCalendarId,

    #[error("Calendar name must not be empty")]
    EmptyCalendarName,

    #[error("Invalid calendar provider: {0}")]
    InvalidProvider(String),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Schedule not found: {0}")]
    ScheduleNotFound(String),

    #[error("Access denied")]
    AccessDenied,

    #[error("Calendar was modified concurrently (expected version {expected})")]
    ConcurrentModification { expected: i64 },

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Calendar conflict: {0}")]
    CalendarConflict(String),
}
