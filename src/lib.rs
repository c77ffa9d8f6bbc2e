#![allow(clippy::doc_markdown)] // Allow technical terms like RabbitMQ, DashMap in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Snapcache
//!
//! Event-driven cache-consistency core shared by a family of game-server
//! microservices. Each service keeps per-entity materialized read caches
//! (accounts, users, inventory, token validity) in sync with the
//! authoritative upstream services.
//!
//! ## Architecture
//!
//! Upstream services publish domain events to a shared topic exchange.
//! The [`messaging`] pipeline consumes them at-least-once through durable
//! queues with dead-lettering, decodes the payloads, and applies them to
//! the [`cache`] stores. Application code reads through the
//! [`repository`] cache-aside decorator, which consults the cache first
//! and falls back to the authoritative repository on miss, repopulating
//! the cache. The token validity cache is fed directly by the credential
//! issuance/validation path, independent of the broker.
//!
//! The caches are strictly an optimization layer: the authoritative
//! repositories own correctness, snapshots are never the basis for
//! uniqueness or authorization decisions, and security-relevant lookups
//! fail closed on a miss.
//!
//! ## Module Organization
//!
//! - [`cache`] - Materialized snapshot caches and the token validity cache
//! - [`repository`] - Authoritative repository contract and cache-aside decorator
//! - [`messaging`] - Broker topology, event dispatch, and the ingestion pipeline
//! - [`events`] - Domain event payloads and the applied-event notifier
//! - [`snapshots`] - Denormalized snapshot entities
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use snapcache::cache::SnapshotCache;
//! use snapcache::config::SnapcacheConfig;
//! use snapcache::events::AppliedEventNotifier;
//! use snapcache::messaging::{EventDispatcher, EventIngestionPipeline, ServiceCaches};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SnapcacheConfig::from_environment();
//! config.validate()?;
//!
//! let caches = ServiceCaches {
//!     accounts: Arc::new(SnapshotCache::new("accounts", config.cache.accounts.clone())),
//!     users: Arc::new(SnapshotCache::new("users", config.cache.users.clone())),
//!     inventory: Arc::new(SnapshotCache::new("inventory", config.cache.inventory.clone())),
//! };
//! let dispatcher = Arc::new(EventDispatcher::new(caches, AppliedEventNotifier::default()));
//!
//! let pipeline = Arc::new(EventIngestionPipeline::new(config.broker.clone(), dispatcher));
//! pipeline.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod messaging;
pub mod repository;
pub mod snapshots;

pub use cache::{CacheEntry, CachePriority, SnapshotCache, TokenValidityCache};
pub use config::{BrokerConfig, CacheConfig, CacheTypeConfig, SnapcacheConfig};
pub use error::{Result, SnapcacheError};
pub use events::{AppliedEvent, AppliedEventNotifier};
pub use messaging::{
    Disposition, EventBinding, EventDispatcher, EventIngestionPipeline, MessagingError,
    PipelineState, ServiceCaches,
};
pub use repository::{CachedRepository, RepositoryError, SnapshotRepository};
pub use snapshots::{
    AccountSnapshot, InventoryItemSnapshot, Snapshot, TokenEntry, UserSnapshot,
};
