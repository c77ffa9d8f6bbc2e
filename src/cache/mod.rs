//! # Cache Layer
//!
//! Materialized per-entity snapshot caches with alias indexes and TTL,
//! plus the token validity short-circuit. These caches are optimization
//! layers over the authoritative repositories; they own entry lifetime,
//! never correctness.

pub mod entry;
pub mod store;
pub mod token;

pub use entry::{CacheEntry, CachePriority};
pub use store::SnapshotCache;
pub use token::TokenValidityCache;
