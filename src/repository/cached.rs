//! # Cache-Aside Repository Decorator
//!
//! Wraps an authoritative [`SnapshotRepository`] with read-through
//! population and write-through-after-commit caching. The backing
//! repository result is always what the caller gets; the cache is a
//! strict optimization layer and can never fail an operation.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::cache::SnapshotCache;
use crate::repository::{RepositoryResult, SnapshotRepository};
use crate::snapshots::Snapshot;

/// Decorator applying the cache-aside pattern to a backing repository.
pub struct CachedRepository<T: Snapshot, R: SnapshotRepository<T>> {
    cache: Arc<SnapshotCache<T>>,
    backing: R,
}

impl<T: Snapshot, R: SnapshotRepository<T>> CachedRepository<T, R> {
    pub fn new(cache: Arc<SnapshotCache<T>>, backing: R) -> Self {
        Self { cache, backing }
    }

    pub fn cache(&self) -> &SnapshotCache<T> {
        &self.cache
    }

    pub fn backing(&self) -> &R {
        &self.backing
    }
}

#[async_trait]
impl<T: Snapshot, R: SnapshotRepository<T>> SnapshotRepository<T> for CachedRepository<T, R> {
    /// Read-through: cache hit returns immediately; a miss consults the
    /// backing repository and populates the cache on a non-empty result.
    async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Option<T>> {
        if let Some(hit) = self.cache.get(id) {
            trace!(cache = %self.cache.name(), entity_id = %id, "Cache hit");
            return Ok(Some(hit));
        }

        let fetched = self.backing.get_by_id(id).await?;
        if let Some(value) = &fetched {
            debug!(cache = %self.cache.name(), entity_id = %id, "Populating cache on read miss");
            self.cache.insert(value.clone());
        }
        Ok(fetched)
    }

    async fn get_by_alias(&self, alias: &str) -> RepositoryResult<Option<T>> {
        if let Some(hit) = self.cache.get_by_alias(alias) {
            trace!(cache = %self.cache.name(), alias = %alias, "Cache hit via alias");
            return Ok(Some(hit));
        }

        let fetched = self.backing.get_by_alias(alias).await?;
        if let Some(value) = &fetched {
            debug!(cache = %self.cache.name(), alias = %alias, "Populating cache on alias miss");
            self.cache.insert(value.clone());
        }
        Ok(fetched)
    }

    /// The backing create must succeed before anything is cached; a
    /// failed create leaves the cache untouched.
    async fn create(&self, value: T) -> RepositoryResult<T> {
        let created = self.backing.create(value).await?;
        self.cache.insert(created.clone());
        Ok(created)
    }

    /// Write-through only after the backing update reports success. The
    /// cache is never optimistically updated with state that was not
    /// durably committed.
    async fn update(&self, value: T) -> RepositoryResult<bool> {
        let applied = self.backing.update(value.clone()).await?;
        if applied {
            self.cache.insert(value);
        } else {
            debug!(
                cache = %self.cache.name(),
                entity_id = %value.primary_key(),
                "Backing update not applied; cache left untouched"
            );
        }
        Ok(applied)
    }

    /// Uniqueness checks always bypass the cache: a stale snapshot could
    /// permit duplicate registrations or false rejections.
    async fn exists_by_alias(&self, alias: &str) -> RepositoryResult<bool> {
        self.backing.exists_by_alias(alias).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheTypeConfig;
    use crate::repository::RepositoryError;
    use crate::snapshots::AccountSnapshot;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory stand-in for an authoritative repository, with call
    /// counters for the bypass/read-through assertions.
    #[derive(Default)]
    struct MockAccountRepository {
        records: Mutex<HashMap<Uuid, AccountSnapshot>>,
        get_by_id_calls: AtomicUsize,
        get_by_alias_calls: AtomicUsize,
        exists_calls: AtomicUsize,
        fail_updates: std::sync::atomic::AtomicBool,
    }

    impl MockAccountRepository {
        fn with_record(record: AccountSnapshot) -> Self {
            let repo = Self::default();
            repo.records.lock().insert(record.id, record);
            repo
        }
    }

    #[async_trait]
    impl SnapshotRepository<AccountSnapshot> for MockAccountRepository {
        async fn get_by_id(&self, id: Uuid) -> RepositoryResult<Option<AccountSnapshot>> {
            self.get_by_id_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.lock().get(&id).cloned())
        }

        async fn get_by_alias(&self, alias: &str) -> RepositoryResult<Option<AccountSnapshot>> {
            self.get_by_alias_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .records
                .lock()
                .values()
                .find(|a| a.email == alias)
                .cloned())
        }

        async fn create(&self, value: AccountSnapshot) -> RepositoryResult<AccountSnapshot> {
            let mut records = self.records.lock();
            if records.values().any(|a| a.email == value.email) {
                return Err(RepositoryError::conflict("email taken"));
            }
            records.insert(value.id, value.clone());
            Ok(value)
        }

        async fn update(&self, value: AccountSnapshot) -> RepositoryResult<bool> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Ok(false);
            }
            let mut records = self.records.lock();
            match records.get_mut(&value.id) {
                Some(existing) => {
                    *existing = value;
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn exists_by_alias(&self, alias: &str) -> RepositoryResult<bool> {
            self.exists_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.lock().values().any(|a| a.email == alias))
        }
    }

    fn cache() -> Arc<SnapshotCache<AccountSnapshot>> {
        Arc::new(SnapshotCache::new(
            "accounts",
            CacheTypeConfig {
                ttl_seconds: 0,
                max_weight: 0,
                entry_weight: 1,
            },
        ))
    }

    fn account(email: &str) -> AccountSnapshot {
        AccountSnapshot {
            id: Uuid::new_v4(),
            email: email.to_string(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_read_miss_populates_then_warm_cache_skips_backing() {
        let record = account("a@b.com");
        let repo = CachedRepository::new(cache(), MockAccountRepository::with_record(record.clone()));

        let first = repo.get_by_id(record.id).await.unwrap();
        assert_eq!(first, Some(record.clone()));
        assert_eq!(repo.backing().get_by_id_calls.load(Ordering::SeqCst), 1);

        let second = repo.get_by_id(record.id).await.unwrap();
        assert_eq!(second, Some(record));
        // Warm cache: backing untouched by the second read.
        assert_eq!(repo.backing().get_by_id_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_result_is_not_cached() {
        let repo = CachedRepository::new(cache(), MockAccountRepository::default());
        let missing = Uuid::new_v4();

        assert_eq!(repo.get_by_id(missing).await.unwrap(), None);
        assert_eq!(repo.get_by_id(missing).await.unwrap(), None);
        // Both misses reached the backing repository.
        assert_eq!(repo.backing().get_by_id_calls.load(Ordering::SeqCst), 2);
        assert!(repo.cache().is_empty());
    }

    #[tokio::test]
    async fn test_alias_read_through() {
        let record = account("a@b.com");
        let repo = CachedRepository::new(cache(), MockAccountRepository::with_record(record.clone()));

        assert_eq!(
            repo.get_by_alias("a@b.com").await.unwrap(),
            Some(record.clone())
        );
        assert_eq!(repo.backing().get_by_alias_calls.load(Ordering::SeqCst), 1);

        // Alias population also warms the primary key path.
        assert_eq!(repo.get_by_id(record.id).await.unwrap(), Some(record));
        assert_eq!(repo.backing().get_by_id_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_caches_after_backing_success() {
        let repo = CachedRepository::new(cache(), MockAccountRepository::default());
        let record = account("new@b.com");

        let created = repo.create(record.clone()).await.unwrap();
        assert_eq!(created, record);
        assert_eq!(repo.cache().get(record.id), Some(record));
    }

    #[tokio::test]
    async fn test_failed_create_leaves_cache_untouched() {
        let existing = account("taken@b.com");
        let repo = CachedRepository::new(cache(), MockAccountRepository::with_record(existing));
        let duplicate = account("taken@b.com");

        assert!(repo.create(duplicate.clone()).await.is_err());
        assert_eq!(repo.cache().get(duplicate.id), None);
    }

    #[tokio::test]
    async fn test_unapplied_update_leaves_cache_untouched() {
        let record = account("a@b.com");
        let repo = CachedRepository::new(cache(), MockAccountRepository::with_record(record.clone()));
        repo.cache().insert(record.clone());

        repo.backing().fail_updates.store(true, Ordering::SeqCst);
        let mut changed = record.clone();
        changed.is_active = false;

        assert!(!repo.update(changed).await.unwrap());
        // Cache still holds the committed state.
        assert!(repo.cache().get(record.id).unwrap().is_active);
    }

    #[tokio::test]
    async fn test_successful_update_writes_through() {
        let record = account("a@b.com");
        let repo = CachedRepository::new(cache(), MockAccountRepository::with_record(record.clone()));

        let mut changed = record.clone();
        changed.is_active = false;
        assert!(repo.update(changed.clone()).await.unwrap());
        assert_eq!(repo.cache().get(record.id), Some(changed));
    }

    #[tokio::test]
    async fn test_exists_by_alias_always_bypasses_cache() {
        let record = account("a@b.com");
        let repo = CachedRepository::new(cache(), MockAccountRepository::with_record(record.clone()));

        // Warm the cache thoroughly.
        repo.cache().insert(record.clone());

        assert!(repo.exists_by_alias("a@b.com").await.unwrap());
        assert!(repo.exists_by_alias("a@b.com").await.unwrap());
        assert!(!repo.exists_by_alias("free@b.com").await.unwrap());
        assert_eq!(repo.backing().exists_calls.load(Ordering::SeqCst), 3);
    }
}
