//! Strategies for running a job away from the caller.
//!
//! ## Overview
//!
//! A job is started by a request handler that must return immediately, so the job itself runs
//! elsewhere. [`IsolatedExecutor`] is that seam:
//! - [`TaskExecutor`] spawns the job as a tokio task in the server process. It needs no worker
//!   binary and works with any cache backend.
//! - the process executor of `cmdrun-exec` runs each job in a worker process. A crash of the
//!   operation then cannot take the server down, but the cache must be shared between processes.
//!
//! Filter, store and runner logic do not depend on the strategy: every executor eventually calls
//! [`crate::run_job`] in its isolated context.
//!
//! ## Admission
//!
//! [`Admission`] optionally caps how many jobs run at once. It is shared by all executors built
//! from one configuration; a job over the cap waits for a slot with its record still unfinished.
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::{error::ExecutorError, runner::JobTicket};

mod task;
pub use task::TaskExecutor;

/// Hands a job off to an isolated execution context.
#[async_trait]
pub trait IsolatedExecutor: Send + Sync + 'static {
    /// Short strategy name for logs (`task`, `process`).
    fn name(&self) -> &'static str;

    /// Start `ticket` without waiting for it to finish.
    ///
    /// The initial record is already stored. An error means the job never started; the caller
    /// terminates the record.
    async fn launch(&self, ticket: JobTicket) -> Result<(), ExecutorError>;
}

/// Optional cap on concurrently running jobs.
///
/// Jobs over the cap wait for a slot; their record stays unfinished meanwhile.
#[derive(Debug, Clone, Default)]
pub struct Admission(Option<Arc<Semaphore>>);

/// Slot held for the lifetime of a running job.
#[derive(Debug)]
pub struct AdmissionPermit {
    _slot: Option<OwnedSemaphorePermit>,
}

impl Admission {
    pub fn unbounded() -> Self {
        Self(None)
    }

    /// At most `max` concurrent jobs; `None` or zero means unbounded.
    pub fn new(max: Option<usize>) -> Self {
        match max {
            Some(max) if max > 0 => Self(Some(Arc::new(Semaphore::new(max)))),
            _ => Self(None),
        }
    }

    /// Slot if one is free right now.
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        match &self.0 {
            None => Some(AdmissionPermit { _slot: None }),
            Some(sem) => sem
                .clone()
                .try_acquire_owned()
                .ok()
                .map(|p| AdmissionPermit { _slot: Some(p) }),
        }
    }

    /// Wait for a slot.
    pub async fn acquire(&self) -> AdmissionPermit {
        match &self.0 {
            None => AdmissionPermit { _slot: None },
            // The semaphore is never closed.
            Some(sem) => AdmissionPermit {
                _slot: sem.clone().acquire_owned().await.ok(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_means_unbounded() {
        let admission = Admission::new(Some(0));
        let _held: Vec<_> = (0..8).map(|_| admission.try_acquire().unwrap()).collect();
        assert!(Admission::new(None).try_acquire().is_some());
    }

    #[tokio::test]
    async fn bounded_admission_holds_slots_until_dropped() {
        let admission = Admission::new(Some(1));
        let first = admission.acquire().await;
        assert!(admission.try_acquire().is_none());
        drop(first);
        assert!(admission.try_acquire().is_some());
    }
}
