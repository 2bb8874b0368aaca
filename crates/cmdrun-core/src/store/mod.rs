//! Status records in the shared cache.
//!
//! ## Overview
//!
//! [`StatusStore`] is the only component that reads or writes job records. It stores one JSON
//! [`StatusRecord`] per job under `command_runner:{id}`, with the ttl from [`StoreLimits`].
//! Callers in the same process, in other tasks and in worker processes all go through it, so they
//! agree on encoding and size rules.
//!
//! ## Size bound
//!
//! Every write is fitted before it reaches the backend:
//! - transcripts are tail-truncated to [`StoreLimits::budget`], with a notice appended;
//! - when the *encoded* record is still over `max_record_bytes` (JSON escaping can grow text up
//!   to sixfold), or the backend rejects it as too large, the budget shrinks by the measured
//!   encoding ratio and the record is fitted again.
//!
//! Any other backend error is returned to the caller unchanged.
//!
//! ## Lifecycle
//!
//! A record starts pending ([`StatusStore::init`]), accumulates transcripts through
//! [`StatusStore::update_transcript`], and ends with a terminal [`StatusStore::set`]. Transcript
//! updates never touch a terminal record.
use std::sync::Arc;

use cmdrun_model::{CacheKey, StatusRecord, StreamKind};
use tracing::{debug, trace, warn};

use crate::{
    cache::CacheBackend,
    error::StoreError,
    limits::{StoreLimits, fit_within},
};


/// Typed view over a [`CacheBackend`] holding [`StatusRecord`]s.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct StatusStore {
    backend: Arc<dyn CacheBackend>,
    limits: StoreLimits,
}

impl StatusStore {
    pub fn new(backend: Arc<dyn CacheBackend>, limits: StoreLimits) -> Self {
        Self { backend, limits }
    }

    pub fn limits(&self) -> &StoreLimits {
        &self.limits
    }

    pub fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    /// Commit the initial record of a new job.
    ///
    /// Runs before the job is handed to an executor, so a poller never sees an unknown id for
    /// a started job.
    pub fn init(&self, key: &CacheKey) -> Result<(), StoreError> {
        self.set(key, &StatusRecord::pending())
    }

    /// Read the record under `key`.
    ///
    /// `Ok(None)` for a key never written or already expired. A payload that is not a record is
    /// a [`StoreError::Decode`].
    pub fn get(&self, key: &CacheKey) -> Result<Option<StatusRecord>, StoreError> {
        let Some(raw) = self.backend.get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    /// Write `record`, truncating transcripts as needed.
    ///
    /// A record over the encoded bound, or one the backend rejects as too large, is fitted again
    /// under a smaller transcript budget. The budget scales by the measured encoding ratio, so
    /// escape-heavy text converges in a few rounds; it strictly decreases, so the loop ends at
    /// an empty transcript at the latest.
    pub fn set(&self, key: &CacheKey, record: &StatusRecord) -> Result<(), StoreError> {
        let max = self.limits.max_record_bytes;
        let mut budget = self.limits.budget();
        let mut attempt = 0usize;

        loop {
            let fitted = fit_within(record, budget);
            let payload =
                serde_json::to_string(&fitted).map_err(|e| StoreError::Encode(e.to_string()))?;
            let size = payload.len();

            let (err, limit) = if size > max {
                let err = StoreError::TooLarge {
                    key: key.to_string(),
                    size,
                    limit: max,
                };
                (err, max)
            } else {
                match self.backend.set(key, payload, Some(self.limits.ttl())) {
                    Ok(()) => {
                        if attempt > 0 {
                            debug!(target: "cmdrun.store", %key, attempt, budget, "record stored after shrinking");
                        }
                        return Ok(());
                    }
                    Err(StoreError::TooLarge { key, size, limit }) => {
                        (StoreError::TooLarge { key, size, limit }, limit)
                    }
                    Err(e) => return Err(e),
                }
            };

            if budget == 0 {
                warn!(target: "cmdrun.store", %key, error = %err, "giving up on record write");
                return Err(err);
            }
            trace!(target: "cmdrun.store", %key, attempt, size, limit, "record over bound; shrinking");
            budget = shrink_budget(budget, fitted.output.len() + fitted.error.len(), size, limit);
            attempt += 1;
        }
    }

    /// Replace one transcript field of a live record.
    ///
    /// A terminal record is left untouched; a missing one is recreated as running.
    pub fn update_transcript(
        &self,
        key: &CacheKey,
        kind: StreamKind,
        text: &str,
    ) -> Result<(), StoreError> {
        let mut record = self.get(key)?.unwrap_or_default();
        if record.is_terminal() {
            trace!(target: "cmdrun.store", %key, "record already terminal; update skipped");
            return Ok(());
        }
        record.set_field(kind, text.to_owned());
        self.set(key, &record)
    }
}

/// Next transcript budget after a payload of `size` bytes carrying `transcript` bytes of text
/// overran `limit`. Always smaller than `budget`.
fn shrink_budget(budget: usize, transcript: usize, size: usize, limit: usize) -> usize {
    // Aim slightly below the bound; the notice and the JSON frame do not scale.
    let target = limit - limit / 64;
    let scaled = (transcript as u128 * target as u128 / size.max(1) as u128) as usize;
    if scaled < budget { scaled } else { budget / 2 }
}
