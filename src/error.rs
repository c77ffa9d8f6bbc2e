//! # Crate-Level Error Handling
//!
//! Top-level error type aggregating the subsystem errors. The subsystems
//! (cache, repository, messaging) each define their own structured error
//! enums; this wrapper exists for callers that drive more than one of them.

use thiserror::Error;

use crate::messaging::MessagingError;
use crate::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum SnapcacheError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Messaging(#[from] MessagingError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<config::ConfigError> for SnapcacheError {
    fn from(err: config::ConfigError) -> Self {
        SnapcacheError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SnapcacheError>;
