use std::{path::PathBuf, process::Stdio, time::Instant};

use async_trait::async_trait;
use cmdrun_core::{
    Admission, CacheConfig, ExecutorError, FlushPolicy, IsolatedExecutor, JobOutcome, JobTicket,
    MetricsHandle, StatusStore, StoreLimits, executor::AdmissionPermit, metrics::noop_metrics,
    runner::record_crash,
};
use cmdrun_model::CacheKey;
use tokio::{io::AsyncWriteExt, process::Child};
use tracing::{debug, trace, warn};

use crate::{
    error::{ExecError, ExecResult},
    limits::{RlimitConfig, attach_rlimits},
    util::{cmd_program, describe_exit},
    worker::{WorkerRequest, outcome_from_exit},
};

/// How worker processes are started.
#[derive(Clone, Debug)]
pub struct ProcessConfig {
    /// Worker executable; it must understand the stdin handoff (see [`crate::run_worker`]).
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    pub rlimits: RlimitConfig,
    /// Store the worker reconnects to. Must be shared across processes.
    pub cache: CacheConfig,
    pub limits: StoreLimits,
    pub flush: FlushPolicy,
}

impl ProcessConfig {
    pub fn new(program: impl Into<String>, cache: CacheConfig) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            rlimits: RlimitConfig::default(),
            cache,
            limits: StoreLimits::default(),
            flush: FlushPolicy::default(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> ExecResult<()> {
        if self.program.is_empty() {
            return Err(ExecError::MissingProgram);
        }
        if !self.cache.shares_across_processes() {
            return Err(ExecError::Config(
                "worker processes need a cache shared across processes".into(),
            ));
        }
        self.limits.validate().map_err(ExecError::Config)
    }
}

/// Runs each job in a worker process of its own.
///
/// Workers are not killed when the executor or its process goes away; a job survives a restart
/// of the caller. When a worker dies without writing its terminal record, the executor writes one
/// carrying the exit status.
pub struct ProcessExecutor {
    cfg: ProcessConfig,
    store: StatusStore,
    admission: Admission,
    metrics: MetricsHandle,
}

impl ProcessExecutor {
    pub fn new(cfg: ProcessConfig) -> ExecResult<Self> {
        cfg.validate()?;
        let store = StatusStore::new(cfg.cache.open()?, cfg.limits);
        Ok(Self {
            cfg,
            store,
            admission: Admission::unbounded(),
            metrics: noop_metrics(),
        })
    }

    pub fn with_admission(mut self, admission: Admission) -> Self {
        self.admission = admission;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.cfg
    }

    fn request_payload(&self, ticket: &JobTicket) -> ExecResult<Vec<u8>> {
        let request = WorkerRequest {
            ticket: ticket.clone(),
            cache: self.cfg.cache.clone(),
            limits: self.cfg.limits,
            flush: self.cfg.flush,
        };
        serde_json::to_vec(&request).map_err(|e| ExecError::Handoff(e.to_string()))
    }

    fn reaper(&self) -> Reaper {
        Reaper {
            store: self.store.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

/// Spawn a worker and hand it the request.
async fn spawn_worker(cfg: &ProcessConfig, payload: &[u8]) -> ExecResult<Child> {
    trace!(target: "cmdrun.exec.proc", program = %cfg.program, args = ?cfg.args, "spawn");

    let mut cmd = cmd_program(&cfg.program, &cfg.args);
    if let Some(cwd) = &cfg.cwd {
        cmd.current_dir(cwd);
    }
    for (k, v) in &cfg.env {
        cmd.env(k, v);
    }
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::inherit());
    cmd.kill_on_drop(false);
    attach_rlimits(&mut cmd, &cfg.rlimits);

    let mut child = cmd.spawn().map_err(|e| ExecError::Spawn(e.to_string()))?;
    let Some(mut stdin) = child.stdin.take() else {
        return Err(abandon(child, "stdin not captured".into()));
    };

    let written = async {
        stdin.write_all(payload).await?;
        stdin.shutdown().await
    }
    .await;
    drop(stdin);

    match written {
        Ok(()) => Ok(child),
        Err(e) => Err(abandon(child, e.to_string())),
    }
}

/// Kill a worker whose handoff failed and reap it in the background.
fn abandon(mut child: Child, reason: String) -> ExecError {
    let _ = child.start_kill();
    tokio::spawn(async move {
        let _ = child.wait().await;
    });
    ExecError::Handoff(reason)
}

/// Waits for a worker and settles its record.
#[derive(Clone)]
struct Reaper {
    store: StatusStore,
    metrics: MetricsHandle,
}

impl Reaper {
    async fn reap(self, mut child: Child, key: CacheKey, started: Instant, _permit: AdmissionPermit) {
        let pid = child.id();
        let outcome = match child.wait().await {
            Ok(status) => match outcome_from_exit(status.code()) {
                Some(outcome) => {
                    debug!(target: "cmdrun.exec.proc", ?pid, %key, %status, "worker exited");
                    outcome
                }
                None => {
                    let status = describe_exit(&status);
                    warn!(target: "cmdrun.exec.proc", ?pid, %key, %status, "worker crashed");
                    self.crash(&key, &format!("Worker process crashed ({status})"));
                    JobOutcome::Crashed
                }
            },
            Err(e) => {
                warn!(target: "cmdrun.exec.proc", ?pid, %key, error = %e, "lost track of worker");
                self.crash(&key, &format!("Worker process lost: {e}"));
                JobOutcome::Crashed
            }
        };
        self.metrics.record_job_completed(outcome, started.elapsed());
    }

    fn crash(&self, key: &CacheKey, message: &str) {
        record_crash(&self.store, key, message, &self.metrics);
    }
}

#[async_trait]
impl IsolatedExecutor for ProcessExecutor {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn launch(&self, ticket: JobTicket) -> Result<(), ExecutorError> {
        let payload = self.request_payload(&ticket)?;
        let reaper = self.reaper();

        // Spawn inline when a slot is free so spawn errors reach the caller.
        if let Some(permit) = self.admission.try_acquire() {
            let child = spawn_worker(&self.cfg, &payload).await?;
            debug!(target: "cmdrun.exec.proc", job = %ticket.id, pid = ?child.id(), "worker started");
            self.metrics.record_job_started();
            tokio::spawn(reaper.reap(child, ticket.key, Instant::now(), permit));
            return Ok(());
        }

        debug!(target: "cmdrun.exec.proc", job = %ticket.id, "no free slot; job queued");
        let cfg = self.cfg.clone();
        let admission = self.admission.clone();
        tokio::spawn(async move {
            let permit = admission.acquire().await;
            match spawn_worker(&cfg, &payload).await {
                Ok(child) => {
                    debug!(target: "cmdrun.exec.proc", job = %ticket.id, pid = ?child.id(), "worker started");
                    reaper.metrics.record_job_started();
                    reaper.reap(child, ticket.key, Instant::now(), permit).await;
                }
                Err(e) => {
                    warn!(target: "cmdrun.exec.proc", job = %ticket.id, error = %e, "queued spawn failed");
                    reaper.crash(&ticket.key, &format!("Failed to launch command: {e}"));
                }
            }
        });
        Ok(())
    }
}
