use integrations::ProviderError;
use shared::errors::DomainError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by the sync services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("No enabled {0} calendar with push sync")]
    NoPushCalendar(String),

    #[error("No calendar configured for import")]
    NoImportCalendar,
}

impl ServiceError {
    /// Whether the caller should re-read state and retry
    pub fn is_concurrent_modification(&self) -> bool {
        matches!(
            self,
            ServiceError::Domain(DomainError::ConcurrentModification { .. })
        )
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        ServiceError::Database(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}
