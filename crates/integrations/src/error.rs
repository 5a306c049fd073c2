use shared::types::ProviderKind;
use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited")]
    RateLimited,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No syncer registered for provider: {0}")]
    NoSyncer(ProviderKind),

    #[error("No importer registered for provider: {0}")]
    NoImporter(ProviderKind),
}

impl ProviderError {
    /// Map an error response status to a provider error
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => ProviderError::Authentication(body),
            404 => ProviderError::NotFound(body),
            429 => ProviderError::RateLimited,
            _ => ProviderError::Api {
                status,
                message: body,
            },
        }
    }

    /// Check if this error is worth retrying on a later cycle
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Http(_) | ProviderError::RateLimited => true,
            ProviderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if this error indicates bad or expired credentials
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ProviderError::Authentication(_) | ProviderError::MissingCredentials(_)
        )
    }
}
