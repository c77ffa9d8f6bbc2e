//! # Materialized Snapshot Cache
//!
//! Per-entity key/value store with a secondary alias index, optional TTL,
//! and weighted least-recently-used eviction. One instance per entity type
//! per service; the ingestion pipeline and the cache-aside decorator are
//! both writers, the authoritative repository owns correctness.
//!
//! A single lock guards the primary map and the alias index together so
//! the two can never diverge: every alias entry resolves to a primary
//! entry that exists, and removing a primary entry removes all aliases
//! pointing at it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::cache::entry::CacheEntry;
use crate::config::CacheTypeConfig;
use crate::snapshots::{AccountSnapshot, Snapshot};

struct Stored<T> {
    entry: CacheEntry<T>,
    aliases: Vec<String>,
    last_touched: u64,
}

struct Inner<T> {
    entries: HashMap<Uuid, Stored<T>>,
    aliases: HashMap<String, Uuid>,
    total_weight: u64,
    /// Monotonic recency counter; bumped on every write and hit
    clock: u64,
}

impl<T> Inner<T> {
    /// Delete the primary entry and every alias that still points at it.
    fn remove_entry(&mut self, id: Uuid) -> bool {
        match self.entries.remove(&id) {
            Some(stored) => {
                for alias in &stored.aliases {
                    // An alias may have been re-pointed at another id by a
                    // later write; only remove it if it is still ours.
                    if self.aliases.get(alias) == Some(&id) {
                        self.aliases.remove(alias);
                    }
                }
                self.total_weight = self
                    .total_weight
                    .saturating_sub(u64::from(stored.entry.weight));
                true
            }
            None => false,
        }
    }

    /// Rewrite the alias index for `id`: stale aliases are deleted before
    /// the new ones are inserted.
    fn reindex_aliases(&mut self, id: Uuid, old: &[String], new: &[String]) {
        for alias in old {
            if !new.contains(alias) && self.aliases.get(alias) == Some(&id) {
                self.aliases.remove(alias);
            }
        }
        for alias in new {
            // Last writer wins if two records ever claim the same alias.
            self.aliases.insert(alias.clone(), id);
        }
    }

    /// Evict lowest-priority, least-recently-used entries until the total
    /// weight fits the budget. The entry named by `keep` (the one just
    /// written) is never evicted.
    fn evict_to_budget(&mut self, max_weight: u64, keep: Uuid) -> usize {
        if max_weight == 0 {
            return 0;
        }
        let mut evicted = 0;
        while self.total_weight > max_weight && self.entries.len() > 1 {
            let victim = self
                .entries
                .iter()
                .filter(|(id, _)| **id != keep)
                .min_by_key(|(_, s)| (s.entry.priority, s.last_touched))
                .map(|(id, _)| *id);
            match victim {
                Some(id) => {
                    self.remove_entry(id);
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }
}

/// Concurrency-safe materialized cache for one snapshot entity type.
pub struct SnapshotCache<T: Snapshot> {
    name: String,
    config: CacheTypeConfig,
    inner: RwLock<Inner<T>>,
}

impl<T: Snapshot> SnapshotCache<T> {
    pub fn new(name: impl Into<String>, config: CacheTypeConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                aliases: HashMap::new(),
                total_weight: 0,
                clock: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full replace of the entry for `value.primary_key()`, using the
    /// configured TTL and weight. Atomically rewrites the alias index.
    pub fn insert(&self, value: T) {
        let mut entry = CacheEntry::new(value).with_weight(self.config.entry_weight);
        if let Some(ttl) = self.config.ttl() {
            entry = entry.with_expiration(
                Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero()),
            );
        }
        self.insert_entry(entry);
    }

    /// Full replace with caller-controlled expiration, priority and weight.
    pub fn insert_entry(&self, entry: CacheEntry<T>) {
        let id = entry.value.primary_key();
        let new_aliases = entry.value.alias_keys();
        let weight = u64::from(entry.weight);

        let mut guard = self.inner.write();
        let inner = &mut *guard;
        inner.clock += 1;
        let tick = inner.clock;

        let old_aliases = match inner.entries.get(&id) {
            Some(old) => old.aliases.clone(),
            None => Vec::new(),
        };
        if let Some(old) = inner.entries.get(&id) {
            let old_weight = u64::from(old.entry.weight);
            inner.total_weight = inner.total_weight.saturating_sub(old_weight);
        }
        inner.reindex_aliases(id, &old_aliases, &new_aliases);
        inner.total_weight += weight;
        inner.entries.insert(
            id,
            Stored {
                entry,
                aliases: new_aliases,
                last_touched: tick,
            },
        );

        let evicted = inner.evict_to_budget(self.config.max_weight, id);
        if evicted > 0 {
            debug!(
                cache = %self.name,
                evicted = evicted,
                total_weight = inner.total_weight,
                "Evicted entries over weight budget"
            );
        }
        trace!(cache = %self.name, entity_id = %id, "Cache entry written");
    }

    /// Look up by primary id. An expired entry is removed and reported as
    /// a miss. A hit refreshes recency.
    pub fn get(&self, id: Uuid) -> Option<T> {
        let now = Utc::now();
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let expired = match inner.entries.get(&id) {
            Some(stored) => stored.entry.is_expired_at(now),
            None => return None,
        };
        if expired {
            inner.remove_entry(id);
            trace!(cache = %self.name, entity_id = %id, "Expired entry dropped on read");
            return None;
        }

        inner.clock += 1;
        let tick = inner.clock;
        let stored = inner.entries.get_mut(&id)?;
        stored.last_touched = tick;
        Some(stored.entry.value.clone())
    }

    /// Resolve a secondary key (username, email) to the primary entry.
    pub fn get_by_alias(&self, key: &str) -> Option<T> {
        let id = { self.inner.read().aliases.get(key).copied() }?;
        self.get(id)
    }

    /// Read-modify-write merge against the cached entry. Returns `false`
    /// when the id is absent (or expired), in which case nothing changes.
    /// Aliases are re-derived after the mutation so an alias-bearing field
    /// change (email rename) re-points the index.
    pub fn merge<F>(&self, id: Uuid, mutate: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        let now = Utc::now();
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let expired = match inner.entries.get(&id) {
            Some(stored) => stored.entry.is_expired_at(now),
            None => return false,
        };
        if expired {
            inner.remove_entry(id);
            return false;
        }

        inner.clock += 1;
        let tick = inner.clock;
        let (old_aliases, new_aliases) = {
            let stored = match inner.entries.get_mut(&id) {
                Some(stored) => stored,
                None => return false,
            };
            mutate(&mut stored.entry.value);
            stored.last_touched = tick;
            let old = std::mem::take(&mut stored.aliases);
            let new = stored.entry.value.alias_keys();
            stored.aliases = new.clone();
            (old, new)
        };
        inner.reindex_aliases(id, &old_aliases, &new_aliases);
        true
    }

    /// Explicit invalidation: deletes the primary entry and all aliases.
    pub fn remove(&self, id: Uuid) -> bool {
        let removed = self.inner.write().remove_entry(id);
        if removed {
            trace!(cache = %self.name, entity_id = %id, "Cache entry removed");
        }
        removed
    }

    /// Drop every expired entry (and its aliases). Returns the count.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let expired: Vec<Uuid> = inner
            .entries
            .iter()
            .filter(|(_, s)| s.entry.is_expired_at(now))
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            inner.remove_entry(*id);
        }
        if !expired.is_empty() {
            debug!(cache = %self.name, swept = expired.len(), "TTL sweep removed expired entries");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn clear(&self) {
        let mut guard = self.inner.write();
        guard.entries.clear();
        guard.aliases.clear();
        guard.total_weight = 0;
    }

    /// Spawn a background sweep at `interval`. The task holds a weak
    /// reference and exits once the cache is dropped.
    pub fn spawn_ttl_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(cache) => {
                        cache.sweep_expired();
                    }
                    None => break,
                }
            }
        })
    }
}

impl SnapshotCache<AccountSnapshot> {
    /// Fail-closed activity check for authorization call sites: a cache
    /// miss (or an expired entry) answers `false`, never "probably".
    pub fn is_account_active(&self, id: Uuid) -> bool {
        self.get(id).map(|a| a.is_active).unwrap_or(false)
    }
}
