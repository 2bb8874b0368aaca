//! Test doubles shared by the unit tests of this crate.
use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use cmdrun_model::CacheKey;

use crate::{
    cache::{CacheBackend, MemoryCache},
    error::StoreError,
    limits::MAX_RECORD_BYTES,
};

/// Cache whose every operation fails, counting write attempts.
#[derive(Default)]
pub(crate) struct FailingCache {
    sets: AtomicUsize,
}

impl FailingCache {
    pub(crate) fn set_calls(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

impl CacheBackend for FailingCache {
    fn get(&self, _key: &CacheKey) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    fn set(&self, _key: &CacheKey, _value: String, _ttl: Option<Duration>) -> Result<(), StoreError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Unavailable("connection refused".into()))
    }

    fn delete(&self, _key: &CacheKey) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Memory cache that fails, rather than rejects as too large, every value over `cap` bytes.
pub(crate) struct CappedCache {
    inner: MemoryCache,
    cap: usize,
}

impl CappedCache {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            inner: MemoryCache::new(MAX_RECORD_BYTES, 16),
            cap,
        }
    }
}

impl CacheBackend for CappedCache {
    fn get(&self, key: &CacheKey) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &CacheKey, value: String, ttl: Option<Duration>) -> Result<(), StoreError> {
        if value.len() > self.cap {
            return Err(StoreError::Unavailable("payload refused".into()));
        }
        self.inner.set(key, value, ttl)
    }

    fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.inner.delete(key)
    }

    fn name(&self) -> &'static str {
        "capped"
    }
}
