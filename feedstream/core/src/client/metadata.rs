//! Feed Metadata Cache
//!
//! Feed headers change rarely, so [`FeedClient::metadata`] keeps them per
//! collection URL for a fixed TTL.
//!
//! [`FeedClient::metadata`]: super::FeedClient::metadata

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::reader::FeedMetadata;

#[derive(Clone, Debug)]
struct CachedMetadata {
    metadata: FeedMetadata,
    fetched_at: Instant,
}

impl CachedMetadata {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// TTL cache of feed headers keyed by collection URL
#[derive(Debug)]
pub struct MetadataCache {
    entries: DashMap<String, CachedMetadata>,
    ttl: Duration,
}

impl MetadataCache {
    /// Default time-to-live
    pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

    /// Create an empty cache
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Configured time-to-live
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a cached header if it has not expired
    #[must_use]
    pub fn get(&self, key: &str) -> Option<FeedMetadata> {
        let entry = self.entries.get(key)?;
        entry
            .is_fresh(self.ttl)
            .then(|| entry.metadata.clone())
    }

    /// Store a freshly fetched header
    pub fn insert(&self, key: impl Into<String>, metadata: FeedMetadata) {
        self.entries.insert(
            key.into(),
            CachedMetadata {
                metadata,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop one entry; returns whether it was present
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop expired entries; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, cached| cached.is_fresh(self.ttl));
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored entries, fresh or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}
