use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine not found: {0}")]
    NotFound(String),

    #[error("Engine {id} failed to load: {message}")]
    LoadFailed { id: String, message: String },

    #[error("Engine {0} is shut down")]
    ShutDown(String),

    #[error("Circuit open for engine {0}")]
    CircuitOpen(String),

    #[error("Engine {0} call timed out")]
    Timeout(String),

    #[error("Engine execution failed: {0}")]
    Execution(String),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Unknown engine kind: {0}")]
    UnknownKind(String),

    #[error("Engine requires SDK {required}, runtime provides {current}")]
    IncompatibleSdk { required: String, current: String },

    #[error("Forbidden character {0:?} in binary path")]
    ForbiddenPathCharacter(char),

    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Engine already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Cannot unregister built-in engine: {0}")]
    BuiltinProtected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
