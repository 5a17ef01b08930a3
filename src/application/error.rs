use std::time::Duration;

use thiserror::Error;

use crate::{application::repos::RepoError, domain::error::DomainError, infra::error::InfraError};

/// Coarse classification callers map onto their own transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    PermissionDenied,
    Timeout,
    Internal,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("operation `{operation}` exceeded its {limit:?} deadline")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::Domain(DomainError::Validation { .. }) | AppError::Validation(_) => {
                ErrorKind::Validation
            }
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            AppError::Timeout { .. } => ErrorKind::Timeout,
            AppError::Infra(_) | AppError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::not_found("record"),
            RepoError::Duplicate { constraint } => {
                AppError::conflict(format!("record violates unique constraint `{constraint}`"))
            }
            RepoError::InvalidInput { message } => AppError::Validation(message),
            RepoError::Timeout => AppError::internal("database timeout"),
            RepoError::Integrity { message } => AppError::Internal(message),
            RepoError::Persistence(message) => AppError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_errors_map_onto_taxonomy() {
        let duplicate = AppError::from(RepoError::Duplicate {
            constraint: "interactions_user_post_key".into(),
        });
        assert_eq!(duplicate.kind(), ErrorKind::Conflict);
        assert_eq!(AppError::from(RepoError::NotFound).kind(), ErrorKind::NotFound);
        assert_eq!(
            AppError::from(RepoError::invalid_input("bad uuid")).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AppError::from(RepoError::from_persistence("pool closed")).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn domain_validation_is_a_validation_error() {
        let err = AppError::from(DomainError::validation("bad date"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn rejected_scoring_weights_are_validation_errors() {
        let scoring = crate::domain::scoring::ScoringConfig {
            gravity: -1.0,
            ..Default::default()
        };
        let err = AppError::from(scoring.validate().unwrap_err());
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("gravity"));
    }
}
