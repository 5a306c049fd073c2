pub mod errors;
pub mod types;

pub use errors::DomainError;
pub use types::*;
