//! Worker side of the process handoff.
//!
//! The parent writes one JSON [`WorkerRequest`] to the worker's stdin and closes it. The worker
//! opens its own store connection from the request, runs the job and reports the outcome through
//! its exit code.
use std::sync::Arc;

use cmdrun_core::{
    CacheConfig, Catalog, FlushPolicy, JobContext, JobOutcome, JobTicket, MetricsHandle,
    StatusStore, StoreLimits, run_job,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::error::{ExecError, ExecResult};

/// Job finished; its record was written by the worker.
pub const EXIT_SUCCEEDED: i32 = 0;
/// Operation failed; its record was written by the worker.
pub const EXIT_FAILED: i32 = 1;
/// The request could not be read or the store could not be opened.
pub const EXIT_BAD_REQUEST: i32 = 2;
/// The operation panicked.
pub const EXIT_CRASHED: i32 = 3;

/// Largest request the worker accepts on stdin.
const MAX_REQUEST_BYTES: u64 = 1024 * 1024;

/// Message handed to a worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub ticket: JobTicket,
    pub cache: CacheConfig,
    #[serde(default)]
    pub limits: StoreLimits,
    #[serde(default)]
    pub flush: FlushPolicy,
}

pub fn exit_code(outcome: JobOutcome) -> i32 {
    match outcome {
        JobOutcome::Succeeded => EXIT_SUCCEEDED,
        JobOutcome::Failed => EXIT_FAILED,
        JobOutcome::Crashed => EXIT_CRASHED,
    }
}

/// Outcome the parent derives from a worker exit code. `None` means the worker died without a
/// terminal record of its own making.
pub fn outcome_from_exit(code: Option<i32>) -> Option<JobOutcome> {
    match code {
        Some(EXIT_SUCCEEDED) => Some(JobOutcome::Succeeded),
        Some(EXIT_FAILED) => Some(JobOutcome::Failed),
        _ => None,
    }
}

/// Read a [`WorkerRequest`] from `input`.
pub async fn read_request<R>(input: R) -> ExecResult<WorkerRequest>
where
    R: AsyncRead + Unpin,
{
    let mut raw = Vec::new();
    input.take(MAX_REQUEST_BYTES).read_to_end(&mut raw).await?;
    let request: WorkerRequest =
        serde_json::from_slice(&raw).map_err(|e| ExecError::Decode(e.to_string()))?;
    request.limits.validate().map_err(ExecError::Decode)?;
    Ok(request)
}

/// Worker entry point: read the request, reconnect to the store, run the job.
pub async fn run_worker<R>(
    input: R,
    catalog: Arc<dyn Catalog>,
    metrics: MetricsHandle,
) -> ExecResult<JobOutcome>
where
    R: AsyncRead + Unpin,
{
    let request = read_request(input).await?;
    debug!(
        target: "cmdrun.exec.proc",
        job = %request.ticket.id,
        cache = ?request.cache,
        "worker request received"
    );

    let store = StatusStore::new(request.cache.open()?, request.limits);
    let ctx = JobContext {
        store,
        catalog,
        flush: request.flush,
        metrics,
    };
    Ok(run_job(&ctx, &request.ticket).await)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use cmdrun_core::{CommandIo, Operation, OperationError, OperationRegistry, metrics::noop_metrics};
    use cmdrun_model::{JobId, StatusRecord};

    use super::*;

    struct Shout;

    #[async_trait]
    impl Operation for Shout {
        fn name(&self) -> &str {
            "shout"
        }
        async fn run(&self, args: &[String], io: &mut CommandIo) -> Result<(), OperationError> {
            io.outln(args.join(" ").to_uppercase());
            Ok(())
        }
    }

    fn catalog() -> Arc<dyn Catalog> {
        Arc::new(OperationRegistry::new().with(Shout).unwrap())
    }

    #[tokio::test]
    async fn worker_writes_record_into_shared_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheConfig::file(dir.path());
        let ticket = JobTicket::new(JobId::generate(), "shout", vec!["hi".into(), "there".into()]);
        let request = WorkerRequest {
            ticket: ticket.clone(),
            cache: cache.clone(),
            limits: StoreLimits::default(),
            flush: FlushPolicy::default(),
        };
        let payload = serde_json::to_vec(&request).unwrap();

        let outcome = run_worker(payload.as_slice(), catalog(), noop_metrics())
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Succeeded);
        assert_eq!(exit_code(outcome), EXIT_SUCCEEDED);

        let store = StatusStore::new(cache.open().unwrap(), StoreLimits::default());
        assert_eq!(
            store.get(&ticket.key).unwrap(),
            Some(StatusRecord::finished("HI THERE\n", ""))
        );
    }

    #[tokio::test]
    async fn garbage_request_is_rejected() {
        let err = run_worker(&b"{not json"[..], catalog(), noop_metrics())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Decode(_)));
    }

    #[tokio::test]
    async fn request_defaults_limits_and_flush() {
        let raw = serde_json::json!({
            "ticket": {"id": "abc", "key": "command_runner:abc", "command": "shout", "args": []},
            "cache": {"kind": "memory", "max_value_bytes": 1000, "max_entries": 10}
        });
        let request = read_request(raw.to_string().as_bytes()).await.unwrap();
        assert_eq!(request.limits, StoreLimits::default());
        assert_eq!(request.flush, FlushPolicy::default());
    }

    #[test]
    fn exit_codes_map_back_to_outcomes() {
        assert_eq!(outcome_from_exit(Some(exit_code(JobOutcome::Succeeded))), Some(JobOutcome::Succeeded));
        assert_eq!(outcome_from_exit(Some(exit_code(JobOutcome::Failed))), Some(JobOutcome::Failed));
        assert_eq!(outcome_from_exit(Some(exit_code(JobOutcome::Crashed))), None);
        assert_eq!(outcome_from_exit(Some(EXIT_BAD_REQUEST)), None);
        assert_eq!(outcome_from_exit(None), None);
    }
}
