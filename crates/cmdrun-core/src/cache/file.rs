use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use cmdrun_model::CacheKey;
use serde::{Deserialize, Serialize};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use super::CacheBackend;
use crate::error::StoreError;

/// A sweep for expired entries runs after this many writes through one handle.
const SWEEP_EVERY_WRITES: usize = 256;

/// Temporary files older than this belong to a writer that died mid-write.
const STALE_TMP_AGE: Duration = Duration::from_secs(10 * 60);

const ENTRY_SUFFIX: &str = ".json";
const TMP_SUFFIX: &str = ".tmp";

/// Cache keeping one JSON file per entry in a directory.
///
/// # Layout
///
/// Each entry lives in `<uuid-v5 of the key>.json`, so file names have a fixed length whatever
/// the key. The file also records the key itself; a file holding another key reads as absent.
///
/// # Concurrency
///
/// Writes go to a temporary file that is renamed over the target, so readers in other processes
/// see either the old or the new value.
///
/// # Expiry
///
/// An expired entry is removed when it is read, and by a sweep of the whole directory that runs
/// on [`FileCache::open`] and every few hundred writes. The sweep also removes temporary files
/// left behind by writers that died.
///
/// File I/O is blocking. Inside a multi-threaded tokio runtime it runs under
/// [`tokio::task::block_in_place`], so other tasks move off the worker thread meanwhile.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    max_value_bytes: usize,
    writes: Arc<AtomicUsize>,
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    #[serde(default)]
    key: String,
    /// Milliseconds since the unix epoch; absent for entries without ttl.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at_ms: Option<u128>,
    value: String,
}

impl StoredEntry {
    fn is_expired(&self, now_ms: u128) -> bool {
        self.expires_at_ms.is_some_and(|at| at <= now_ms)
    }
}

impl FileCache {
    /// Open (and create if needed) the cache directory, then sweep it.
    pub fn open(dir: impl AsRef<Path>, max_value_bytes: usize) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        blocking_io(|| fs::create_dir_all(&dir))?;
        debug!(target: "cmdrun.store", dir = %dir.display(), "file cache opened");

        let cache = Self {
            dir,
            max_value_bytes,
            writes: Arc::new(AtomicUsize::new(0)),
        };
        cache.sweep_logged();
        Ok(cache)
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_str().as_bytes());
        self.dir.join(format!("{}{ENTRY_SUFFIX}", id.simple()))
    }

    /// Remove expired entries and stale temporary files. Returns how many files were removed.
    pub fn sweep(&self) -> Result<usize, StoreError> {
        blocking_io(|| self.sweep_dir())
    }

    fn sweep_dir(&self) -> Result<usize, StoreError> {
        let now = now_ms();
        let mut removed = 0;

        for dirent in fs::read_dir(&self.dir)? {
            let dirent = dirent?;
            let path = dirent.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let stale = if name.ends_with(TMP_SUFFIX) {
                dirent
                    .metadata()
                    .and_then(|m| m.modified())
                    .ok()
                    .and_then(|at| at.elapsed().ok())
                    .is_some_and(|age| age >= STALE_TMP_AGE)
            } else if name.ends_with(ENTRY_SUFFIX) {
                // Unreadable or foreign files are left alone.
                fs::read_to_string(&path)
                    .ok()
                    .and_then(|raw| serde_json::from_str::<StoredEntry>(&raw).ok())
                    .is_some_and(|entry| entry.is_expired(now))
            } else {
                false
            };

            if stale && remove_quietly(&path) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn sweep_logged(&self) {
        match self.sweep() {
            Ok(0) => {}
            Ok(removed) => {
                debug!(target: "cmdrun.store", dir = %self.dir.display(), removed, "expired entries swept")
            }
            Err(e) => {
                warn!(target: "cmdrun.store", dir = %self.dir.display(), error = %e, "cache sweep failed")
            }
        }
    }

    fn write_entry(&self, path: &Path, encoded: &[u8]) -> Result<(), StoreError> {
        let tmp = self
            .dir
            .join(format!(".{}{TMP_SUFFIX}", Uuid::new_v4().simple()));
        let written = fs::write(&tmp, encoded).and_then(|()| fs::rename(&tmp, path));
        if let Err(e) = written {
            remove_quietly(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

/// Run blocking file I/O. A multi-threaded runtime hands this worker's other tasks to its peers
/// first; outside a runtime, or on a current-thread one, `f` simply runs.
fn blocking_io<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Remove `path`, ignoring a file that is already gone. Returns whether a file was removed.
fn remove_quietly(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(target: "cmdrun.store", path = %path.display(), error = %e, "failed to remove cache file");
            false
        }
    }
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

impl CacheBackend for FileCache {
    fn get(&self, key: &CacheKey) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        let raw = match blocking_io(|| fs::read_to_string(&path)) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: StoredEntry =
            serde_json::from_str(&raw).map_err(|e| StoreError::Decode(e.to_string()))?;

        if entry.key != key.as_str() {
            trace!(target: "cmdrun.store", %key, stored = %entry.key, "file holds another key");
            return Ok(None);
        }
        if entry.is_expired(now_ms()) {
            blocking_io(|| remove_quietly(&path));
            return Ok(None);
        }
        Ok(Some(entry.value))
    }

    fn set(&self, key: &CacheKey, value: String, ttl: Option<Duration>) -> Result<(), StoreError> {
        if value.len() > self.max_value_bytes {
            return Err(StoreError::TooLarge {
                key: key.to_string(),
                size: value.len(),
                limit: self.max_value_bytes,
            });
        }
        let entry = StoredEntry {
            key: key.as_str().to_owned(),
            expires_at_ms: ttl.map(|ttl| now_ms() + ttl.as_millis()),
            value,
        };
        let encoded = serde_json::to_vec(&entry).map_err(|e| StoreError::Encode(e.to_string()))?;

        let path = self.path_for(key);
        blocking_io(|| self.write_entry(&path, &encoded))?;

        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY_WRITES == 0 {
            self.sweep_logged();
        }
        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match blocking_io(|| fs::remove_file(&path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
