//! # Ephemeral Token Validity Cache
//!
//! Performance short-circuit for credential validation: a hit means "this
//! token hash passed full verification recently and has not expired", a
//! miss means "unknown" — never "invalid". Callers must fall back to full
//! cryptographic verification on miss and backfill on success.
//!
//! The cached expiration is always the token's own expiry claim, so an
//! entry can never outlive the credential it represents. There is no
//! independently chosen TTL.
//!
//! Only single-token invalidation is provided. Revoking every outstanding
//! token for a user (password change) is not expressible here; services
//! needing that must version their credentials upstream.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::snapshots::TokenEntry;

/// Concurrent map from token hash to validity record.
#[derive(Debug, Default)]
pub struct TokenValidityCache {
    entries: DashMap<String, TokenEntry>,
}

impl TokenValidityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a token that passed full verification. `expires_at` must be
    /// the token's own expiry claim. Already-expired claims are ignored.
    pub fn add_valid(&self, token_hash: impl Into<String>, user_id: Uuid, expires_at: DateTime<Utc>) {
        let token_hash = token_hash.into();
        if expires_at <= Utc::now() {
            debug!(user_id = %user_id, "Refusing to cache already-expired token");
            return;
        }
        trace!(user_id = %user_id, expires_at = %expires_at, "Token validity cached");
        self.entries.insert(
            token_hash.clone(),
            TokenEntry {
                token_hash,
                user_id,
                expires_at,
            },
        );
    }

    /// Pure cache lookup, no cryptographic verification. `false` means
    /// "unknown or expired", not "invalid". An expired entry is dropped.
    pub fn is_valid(&self, token_hash: &str) -> bool {
        let expired = match self.entries.get(token_hash) {
            Some(entry) => entry.expires_at <= Utc::now(),
            None => return false,
        };
        if expired {
            self.entries.remove(token_hash);
            return false;
        }
        true
    }

    /// Look up the user a cached token belongs to, if still valid.
    pub fn user_for(&self, token_hash: &str) -> Option<Uuid> {
        if !self.is_valid(token_hash) {
            return None;
        }
        self.entries.get(token_hash).map(|e| e.user_id)
    }

    /// Drop a single token (logout, explicit revocation).
    pub fn invalidate(&self, token_hash: &str) -> bool {
        self.entries.remove(token_hash).is_some()
    }

    /// Drop every entry whose claim has lapsed. Returns the count.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(purged = purged, "Purged expired token validity entries");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
