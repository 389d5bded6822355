use thiserror::Error;

use crate::models::invitation::InvitationStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error("{0} not found")]
    NotFound(String),
    #[error("invitation cannot move from {from} to {to}")]
    InvalidTransition {
        from: InvitationStatus,
        to: InvitationStatus,
    },
    #[error("{0}")]
    Validation(String),
    #[error("unauthorized")]
    Unauthorized,
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, AppError::InvalidTransition { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}
