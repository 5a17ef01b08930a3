use thiserror::Error;

/// Input rejected before it reaches a store: search criteria, paging bounds
/// and scoring weights.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
