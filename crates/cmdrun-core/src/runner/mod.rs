//! Execution of one job inside its isolated context.
//!
//! [`run_job`] is what every executor ends up calling: in a spawned task of the caller's process
//! or in a worker process of its own. It binds the output streams to the job's record, invokes the
//! operation and writes the terminal record exactly once.
use std::{any::Any, sync::Arc, time::Instant};

use cmdrun_model::{CacheKey, JobId, StatusRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    catalog::Catalog,
    error::OperationError,
    filter::{CommandIo, FlushPolicy},
    limits::{FALLBACK_ERROR_BYTES, truncate_head},
    metrics::{JobOutcome, MetricsHandle},
    store::StatusStore,
};

pub const FALLBACK_SUCCESS_NOTICE: &str = "Command completed but output too large for cache";
pub const FALLBACK_FAILURE_NOTICE: &str = "Command failed and output too large for cache";

/// Everything a worker needs to run one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTicket {
    pub id: JobId,
    pub key: CacheKey,
    pub command: String,
    pub args: Vec<String>,
}

impl JobTicket {
    pub fn new(id: JobId, command: impl Into<String>, args: Vec<String>) -> Self {
        let key = CacheKey::for_job(&id);
        Self {
            id,
            key,
            command: command.into(),
            args,
        }
    }
}

/// Shared collaborators of [`run_job`].
#[derive(Clone)]
pub struct JobContext {
    pub store: StatusStore,
    pub catalog: Arc<dyn Catalog>,
    pub flush: FlushPolicy,
    pub metrics: MetricsHandle,
}

/// Run `ticket` to completion and write its terminal record.
///
/// Never fails: operation errors and panics end up in the record, store failures are degraded.
pub async fn run_job(ctx: &JobContext, ticket: &JobTicket) -> JobOutcome {
    let started = Instant::now();
    ctx.metrics.record_job_started();
    info!(
        target: "cmdrun.job",
        job = %ticket.id,
        command = %ticket.command,
        args = ticket.args.len(),
        "job started"
    );

    let io = CommandIo::bound(&ctx.store, &ticket.key, ctx.flush, ctx.metrics.clone());
    let invocation = invoke(ctx.catalog.as_ref(), &ticket.command, ticket.args.clone(), io);

    let outcome = match invocation.await {
        Ok((io, result)) => {
            let (output, stderr) = io.into_transcripts();
            match result {
                Ok(()) => {
                    write_terminal(ctx, &ticket.key, StatusRecord::finished(output, stderr), true);
                    JobOutcome::Succeeded
                }
                Err(e) => {
                    debug!(target: "cmdrun.job", job = %ticket.id, error = %e, "operation failed");
                    let error = compose_error(stderr, &e.to_string());
                    write_terminal(ctx, &ticket.key, StatusRecord::finished(output, error), false);
                    JobOutcome::Failed
                }
            }
        }
        Err(message) => {
            error!(target: "cmdrun.job", job = %ticket.id, %message, "job crashed");
            record_crash(&ctx.store, &ticket.key, &message, &ctx.metrics);
            JobOutcome::Crashed
        }
    };

    let elapsed = started.elapsed();
    ctx.metrics.record_job_completed(outcome, elapsed);
    info!(
        target: "cmdrun.job",
        job = %ticket.id,
        outcome = outcome.as_str(),
        elapsed_ms = elapsed.as_millis() as u64,
        "job finished"
    );
    outcome
}

/// Invoke `command` in a task of its own so a panic unwinds there and not through the caller.
///
/// Returns the streams and the operation result, or the panic message.
async fn invoke(
    catalog: &dyn Catalog,
    command: &str,
    args: Vec<String>,
    mut io: CommandIo,
) -> Result<(CommandIo, Result<(), OperationError>), String> {
    let op = catalog.resolve(command);
    let command = command.to_owned();
    let handle = tokio::spawn(async move {
        let result = match op {
            Some(op) => op.run(&args, &mut io).await,
            None => Err(OperationError::UnknownCommand(command)),
        };
        (io, result)
    });
    handle.await.map_err(|join_err| {
        if join_err.is_panic() {
            format!("operation panicked: {}", panic_message(join_err.into_panic()))
        } else {
            "operation was cancelled".to_string()
        }
    })
}

/// Run `command` to completion in the calling process, without a store behind its streams.
///
/// The returned record is always terminal.
pub async fn run_inline(catalog: &dyn Catalog, command: &str, args: Vec<String>) -> StatusRecord {
    debug!(target: "cmdrun.job", %command, "inline run");
    match invoke(catalog, command, args, CommandIo::detached()).await {
        Ok((io, result)) => {
            let (output, stderr) = io.into_transcripts();
            match result {
                Ok(()) => StatusRecord::finished(output, stderr),
                Err(e) => StatusRecord::finished(output, compose_error(stderr, &e.to_string())),
            }
        }
        Err(message) => StatusRecord::finished("", message),
    }
}

/// Append `message` to what the operation wrote to stderr.
fn compose_error(mut stderr: String, message: &str) -> String {
    if message.is_empty() {
        return stderr;
    }
    if !stderr.is_empty() && !stderr.ends_with('\n') {
        stderr.push('\n');
    }
    stderr.push_str(message);
    stderr
}

/// Write the terminal record, degrading to the minimal fallback record.
fn write_terminal(ctx: &JobContext, key: &CacheKey, record: StatusRecord, succeeded: bool) {
    let Err(e) = ctx.store.set(key, &record) else {
        return;
    };
    warn!(target: "cmdrun.job", %key, error = %e, "terminal write failed; storing fallback record");
    ctx.metrics.record_store_error(e.kind());

    let notice = if succeeded {
        FALLBACK_SUCCESS_NOTICE
    } else {
        FALLBACK_FAILURE_NOTICE
    };
    let fallback = StatusRecord::finished(notice, truncate_head(&record.error, FALLBACK_ERROR_BYTES));
    if let Err(e) = ctx.store.set(key, &fallback) {
        error!(target: "cmdrun.job", %key, error = %e, "fallback write failed; record left stale");
        ctx.metrics.record_store_error(e.kind());
    }
}

/// Terminate a record whose job died without writing one.
///
/// Keeps whatever transcript was flushed and appends `message` to the error. A record that is
/// already terminal is left alone.
pub fn record_crash(store: &StatusStore, key: &CacheKey, message: &str, metrics: &MetricsHandle) {
    let current = match store.get(key) {
        Ok(current) => current.unwrap_or_default(),
        Err(e) => {
            warn!(target: "cmdrun.job", %key, error = %e, "could not read record of crashed job");
            metrics.record_store_error(e.kind());
            StatusRecord::default()
        }
    };
    if current.is_terminal() {
        return;
    }
    let record = StatusRecord::finished(current.output, compose_error(current.error, message));
    if let Err(e) = store.set(key, &record) {
        error!(target: "cmdrun.job", %key, error = %e, "crash record write failed");
        metrics.record_store_error(e.kind());
    }
}

/// Text of a panic payload.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
