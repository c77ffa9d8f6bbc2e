//! Cache entry wrapper with absolute expiration and eviction hints.

use chrono::{DateTime, Utc};

/// Eviction priority hint. Lower priorities are evicted first when the
/// cache is over its weight budget; recency breaks ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum CachePriority {
    Low,
    #[default]
    Normal,
    High,
}

/// A cached value with optional absolute expiration.
///
/// An entry whose expiration is in the past is logically absent even while
/// still physically stored; every read path checks this before returning.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub expires_at: Option<DateTime<Utc>>,
    pub priority: CachePriority,
    pub weight: u32,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            expires_at: None,
            priority: CachePriority::Normal,
            weight: 1,
        }
    }

    pub fn with_expiration(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_priority(mut self, priority: CachePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Whether the entry is logically absent as of `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_entry_without_expiration_never_expires() {
        let entry = CacheEntry::new(42u32);
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_entry_with_past_expiration_is_logically_absent() {
        let entry = CacheEntry::new(42u32).with_expiration(Utc::now() - Duration::seconds(1));
        assert!(entry.is_expired());
    }

    #[test]
    fn test_entry_with_future_expiration_is_present() {
        let entry = CacheEntry::new(42u32).with_expiration(Utc::now() + Duration::minutes(5));
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_priority_ordering_for_eviction() {
        assert!(CachePriority::Low < CachePriority::Normal);
        assert!(CachePriority::Normal < CachePriority::High);
        assert_eq!(CachePriority::default(), CachePriority::Normal);
    }
}
