use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};

use cmdrun_model::CacheKey;
use tracing::trace;

use super::CacheBackend;
use crate::{error::StoreError, limits::MAX_RECORD_BYTES};

pub(crate) const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// In-process cache.
///
/// When full, expired entries are purged first; if that is not enough the entry closest to
/// expiry is evicted (entries without ttl go last).
#[derive(Clone)]
pub struct MemoryCache {
    inner: Arc<RwLock<MemoryCacheInner>>,
    max_value_bytes: usize,
    max_entries: usize,
}

struct MemoryCacheInner {
    entries: HashMap<CacheKey, Entry>,
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(MAX_RECORD_BYTES, DEFAULT_MAX_ENTRIES)
    }
}

impl MemoryCache {
    pub fn new(max_value_bytes: usize, max_entries: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryCacheInner {
                entries: HashMap::new(),
            })),
            max_value_bytes,
            max_entries: max_entries.max(1),
        }
    }

    /// Live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .read()
            .map(|inner| inner.entries.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MemoryCacheInner {
    fn make_room(&mut self, now: Instant, max_entries: usize) {
        if self.entries.len() < max_entries {
            return;
        }
        self.entries.retain(|_, e| !e.is_expired(now));

        while self.entries.len() >= max_entries {
            let victim = self
                .entries
                .iter()
                .min_by_key(|(_, e)| (e.expires_at.is_none(), e.expires_at))
                .map(|(k, _)| k.clone());
            match victim {
                Some(key) => {
                    trace!(target: "cmdrun.store", %key, "evicting cache entry");
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<String>, StoreError> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner
            .entries
            .get(key)
            .filter(|e| !e.is_expired(Instant::now()))
            .map(|e| e.value.clone()))
    }

    fn set(&self, key: &CacheKey, value: String, ttl: Option<Duration>) -> Result<(), StoreError> {
        if value.len() > self.max_value_bytes {
            return Err(StoreError::TooLarge {
                key: key.to_string(),
                size: value.len(),
                limit: self.max_value_bytes,
            });
        }
        let now = Instant::now();
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        if !inner.entries.contains_key(key) {
            inner.make_room(now, self.max_entries);
        }
        inner.entries.insert(
            key.clone(),
            Entry {
                value,
                expires_at: ttl.map(|ttl| now + ttl),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        inner.entries.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
