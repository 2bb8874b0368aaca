//! Metrics hook for job execution.
//!
//! The core crate only defines the trait; exporters live in their own crates.
use std::{sync::Arc, time::Duration};

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobOutcome {
    /// Operation returned normally.
    Succeeded,
    /// Operation raised an error (unknown command and usage errors included).
    Failed,
    /// Operation panicked or its worker died before writing a terminal record.
    Crashed,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Succeeded => "succeeded",
            JobOutcome::Failed => "failed",
            JobOutcome::Crashed => "crashed",
        }
    }
}

/// Sink for job lifecycle events.
///
/// Called from hot paths: implementations must not block.
pub trait MetricsBackend: Send + Sync + 'static {
    fn record_job_started(&self);
    fn record_job_completed(&self, outcome: JobOutcome, duration: Duration);
    /// `kind` is [`crate::StoreError::kind`].
    fn record_store_error(&self, kind: &'static str);
}

/// Backend that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsBackend for NoopMetrics {
    fn record_job_started(&self) {}
    fn record_job_completed(&self, _outcome: JobOutcome, _duration: Duration) {}
    fn record_store_error(&self, _kind: &'static str) {}
}

pub type MetricsHandle = Arc<dyn MetricsBackend>;

pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoopMetrics)
}
