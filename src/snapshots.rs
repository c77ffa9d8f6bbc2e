//! # Snapshot Entities
//!
//! Denormalized, eventually-consistent copies of authoritative records,
//! optimized for local reads. Snapshots are never the source of truth:
//! uniqueness and authorization decisions always go back to the owning
//! service's repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A record type that can live in a [`SnapshotCache`](crate::cache::SnapshotCache).
///
/// `alias_keys` returns the secondary keys (username, email) that must
/// resolve to this record; the cache maintains the alias index from them.
pub trait Snapshot: Clone + Send + Sync + 'static {
    /// Primary identifier of the authoritative record
    fn primary_key(&self) -> Uuid;

    /// Secondary lookup keys derived from the record
    fn alias_keys(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Simplified copy of an account record from the identity service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
}

impl Snapshot for AccountSnapshot {
    fn primary_key(&self) -> Uuid {
        self.id
    }

    fn alias_keys(&self) -> Vec<String> {
        vec![self.email.clone()]
    }
}

/// Simplified copy of a user profile record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
}

impl Snapshot for UserSnapshot {
    fn primary_key(&self) -> Uuid {
        self.id
    }

    fn alias_keys(&self) -> Vec<String> {
        vec![self.username.clone(), self.email.clone()]
    }
}

/// Simplified copy of an inventory item record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItemSnapshot {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub item_code: String,
    pub quantity: i64,
}

impl Snapshot for InventoryItemSnapshot {
    fn primary_key(&self) -> Uuid {
        self.id
    }
}

/// Cached validity record for an issued credential.
///
/// `expires_at` is always the token's own cryptographic expiry claim;
/// see [`TokenValidityCache`](crate::cache::TokenValidityCache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}
