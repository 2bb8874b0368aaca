//! Shared key/value cache holding status records and help texts.
//!
//! Values are opaque strings with an optional time-to-live. Any process configured with the same
//! [`CacheConfig`] sees the same entries as long as the backend is shared across processes.
use std::{path::PathBuf, sync::Arc, time::Duration};

use cmdrun_model::CacheKey;
use serde::{Deserialize, Serialize};

use crate::{error::StoreError, limits::MAX_RECORD_BYTES};

mod file;
pub use file::FileCache;

mod memory;
pub use memory::MemoryCache;

/// Storage behind [`crate::StatusStore`] and [`crate::HelpCache`].
pub trait CacheBackend: Send + Sync + 'static {
    /// Value under `key`, `None` when absent or expired.
    fn get(&self, key: &CacheKey) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`. `ttl == None` keeps the entry until overwritten.
    ///
    /// Fails with [`StoreError::TooLarge`] when the value exceeds the backend's per-entry bound.
    fn set(&self, key: &CacheKey, value: String, ttl: Option<Duration>) -> Result<(), StoreError>;

    fn delete(&self, key: &CacheKey) -> Result<(), StoreError>;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

/// Which backend to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheConfig {
    /// In-process map; visible only inside the current process.
    Memory {
        max_value_bytes: usize,
        max_entries: usize,
    },
    /// One file per entry under `dir`; shared by every process pointing at the same directory.
    File { dir: PathBuf, max_value_bytes: usize },
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::Memory {
            max_value_bytes: MAX_RECORD_BYTES,
            max_entries: memory::DEFAULT_MAX_ENTRIES,
        }
    }
}

impl CacheConfig {
    pub fn file(dir: impl Into<PathBuf>) -> Self {
        CacheConfig::File {
            dir: dir.into(),
            max_value_bytes: MAX_RECORD_BYTES,
        }
    }

    /// Whether separate processes opening this config see the same entries.
    pub fn shares_across_processes(&self) -> bool {
        matches!(self, CacheConfig::File { .. })
    }

    pub fn open(&self) -> Result<Arc<dyn CacheBackend>, StoreError> {
        match self {
            CacheConfig::Memory {
                max_value_bytes,
                max_entries,
            } => Ok(Arc::new(MemoryCache::new(*max_value_bytes, *max_entries))),
            CacheConfig::File {
                dir,
                max_value_bytes,
            } => Ok(Arc::new(FileCache::open(dir, *max_value_bytes)?)),
        }
    }
}
