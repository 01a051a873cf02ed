//! Memoization of eligible groups for preview requests.
//!
//! Only previews read from the cache. Commits always select recipients from
//! the store again, so a stale entry can at worst make a preview outdated.

use std::{
    collections::HashMap,
    fmt,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use crate::{Candidate, MoneyCents};

/// Eligible group and its combined need, as computed at `put` time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedGroup {
    pub candidates: Vec<Candidate>,
    pub max_distributable: MoneyCents,
}

/// Key-value store with per-entry expiry.
pub trait PreviewCache: Send + Sync + fmt::Debug {
    /// Returns the entry stored under `key` unless it has expired.
    fn get(&self, key: &str) -> Option<CachedGroup>;

    /// Stores `value` under `key` for `ttl`.
    fn put(&self, key: &str, value: CachedGroup, ttl: Duration);

    /// Drops every entry.
    fn invalidate_all(&self);
}

/// Cache that never remembers anything.
#[derive(Debug, Default)]
pub struct NoopPreviewCache;

impl PreviewCache for NoopPreviewCache {
    fn get(&self, _key: &str) -> Option<CachedGroup> {
        None
    }

    fn put(&self, _key: &str, _value: CachedGroup, _ttl: Duration) {}

    fn invalidate_all(&self) {}
}

/// In-process cache guarded by a mutex.
#[derive(Debug, Default)]
pub struct MemoryPreviewCache {
    entries: Mutex<HashMap<String, (Instant, CachedGroup)>>,
}

impl MemoryPreviewCache {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a half-written entry.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, (Instant, CachedGroup)>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PreviewCache for MemoryPreviewCache {
    fn get(&self, key: &str) -> Option<CachedGroup> {
        let mut entries = self.lock();
        let now = Instant::now();
        let fresh = entries
            .get(key)
            .filter(|(expires_at, _)| now < *expires_at)
            .map(|(_, value)| value.clone());
        if fresh.is_none() {
            entries.remove(key);
        }
        fresh
    }

    fn put(&self, key: &str, value: CachedGroup, ttl: Duration) {
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            return;
        };
        let mut entries = self.lock();
        entries.insert(key.to_string(), (expires_at, value));
    }

    fn invalidate_all(&self) {
        let mut entries = self.lock();
        entries.clear();
    }
}
