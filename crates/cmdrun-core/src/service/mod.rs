//! Caller-facing start/poll operations.
use std::sync::Arc;

use cmdrun_model::{
    CacheKey, JobId, OperationInfo, StatusRecord, StatusReply, split_arguments,
    validate_command_name,
};
use tracing::{debug, info, warn};

use crate::{
    catalog::{Catalog, HelpCache},
    error::CoreError,
    executor::IsolatedExecutor,
    metrics::MetricsHandle,
    runner::{JobTicket, run_inline},
    store::StatusStore,
};

/// Starts jobs and answers status polls.
///
/// `start` commits the initial record and hands the job to the executor; it never waits for the
/// job. `status` only reads the store.
#[derive(Clone)]
pub struct JobService {
    store: StatusStore,
    executor: Arc<dyn IsolatedExecutor>,
    catalog: Arc<dyn Catalog>,
    help: HelpCache,
    metrics: MetricsHandle,
}

impl JobService {
    pub fn new(
        store: StatusStore,
        executor: Arc<dyn IsolatedExecutor>,
        catalog: Arc<dyn Catalog>,
        help: HelpCache,
        metrics: MetricsHandle,
    ) -> Self {
        Self {
            store,
            executor,
            catalog,
            help,
            metrics,
        }
    }

    /// Start `command` with the whitespace-separated `arguments`.
    ///
    /// Fails only for a malformed command name or when the initial record cannot be stored.
    /// Unknown commands are started and fail inside the job.
    pub async fn start(&self, command: &str, arguments: &str) -> Result<JobId, CoreError> {
        let command = validate_command_name(command)?;
        let ticket = JobTicket::new(JobId::generate(), command, split_arguments(arguments));

        if let Err(e) = self.store.init(&ticket.key) {
            self.metrics.record_store_error(e.kind());
            return Err(e.into());
        }
        info!(
            target: "cmdrun.job",
            job = %ticket.id,
            command = %ticket.command,
            executor = self.executor.name(),
            "job accepted"
        );

        let id = ticket.id.clone();
        let key = ticket.key.clone();
        if let Err(e) = self.executor.launch(ticket).await {
            warn!(target: "cmdrun.job", job = %id, error = %e, "launch failed");
            self.fail_launch(&key, &e.to_string());
        }
        Ok(id)
    }

    fn fail_launch(&self, key: &CacheKey, reason: &str) {
        let record = StatusRecord::finished("", format!("Failed to launch command: {reason}"));
        if let Err(e) = self.store.set(key, &record) {
            warn!(target: "cmdrun.job", %key, error = %e, "could not record launch failure");
            self.metrics.record_store_error(e.kind());
        }
    }

    /// Current record of `id`, or the not-found reply.
    pub fn status(&self, id: &JobId) -> Result<StatusReply, CoreError> {
        let key = CacheKey::for_job(id);
        match self.store.get(&key) {
            Ok(record) => {
                if record.is_none() {
                    debug!(target: "cmdrun.job", job = %id, "status: not found");
                }
                Ok(StatusReply::from(record))
            }
            Err(e) => {
                self.metrics.record_store_error(e.kind());
                Err(e.into())
            }
        }
    }

    /// Run `command` synchronously in this process and return its terminal record.
    ///
    /// Nothing is stored; the caller waits for the operation to finish.
    pub async fn run_inline(&self, command: &str, arguments: &str) -> Result<StatusRecord, CoreError> {
        let command = validate_command_name(command)?;
        Ok(run_inline(self.catalog.as_ref(), command, split_arguments(arguments)).await)
    }

    /// Catalog listing with help texts.
    pub fn list_operations(&self) -> Vec<OperationInfo> {
        self.help.list_operations(self.catalog.as_ref())
    }

    pub fn describe(&self, name: &str) -> Option<String> {
        self.help.describe(self.catalog.as_ref(), name)
    }
}
