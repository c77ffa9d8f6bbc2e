//! # Repository Layer
//!
//! The authoritative repository contract the application services expose
//! (backed by their own persistence — not this crate's concern) and the
//! cache-aside decorator that fronts it with a [`SnapshotCache`].
//!
//! [`SnapshotCache`]: crate::cache::SnapshotCache

pub mod cached;

pub use cached::CachedRepository;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::snapshots::Snapshot;

/// Errors surfaced by an authoritative repository.
///
/// These propagate to callers unchanged; the cache layer never converts a
/// repository error into a cache-derived fallback value.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Repository connection error: {message}")]
    Connection { message: String },

    #[error("Repository query error: {operation}: {message}")]
    Query { operation: String, message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },
}

impl RepositoryError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn query(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Read/write contract of an authoritative record store.
///
/// `get_*` misses are `Ok(None)`, never errors. `update` reports whether
/// the backing store actually applied the change.
#[async_trait]
pub trait SnapshotRepository<T: Snapshot>: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Option<T>>;

    async fn get_by_alias(&self, alias: &str) -> RepositoryResult<Option<T>>;

    async fn create(&self, value: T) -> RepositoryResult<T>;

    async fn update(&self, value: T) -> RepositoryResult<bool>;

    /// Uniqueness probe (e.g. "is this email already registered"). Gates
    /// irreversible decisions, so implementations must answer from the
    /// source of truth.
    async fn exists_by_alias(&self, alias: &str) -> RepositoryResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RepositoryError::query("get_by_id", "connection reset");
        let rendered = format!("{err}");
        assert!(rendered.contains("get_by_id"));
        assert!(rendered.contains("connection reset"));
    }

    #[test]
    fn test_conflict_constructor() {
        let err = RepositoryError::conflict("email taken");
        assert!(matches!(err, RepositoryError::Conflict { .. }));
    }
}
