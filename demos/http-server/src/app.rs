//! Wiring: store, executor, job service and the HTTP router.
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use cmdrun_api::{HttpApi, JobServiceAdapter};
use cmdrun_core::{
    Admission, Catalog, FlushPolicy, HelpCache, IsolatedExecutor, JobContext, JobService,
    MetricsHandle, StatusStore, StoreLimits, TaskExecutor,
};
use cmdrun_exec::{ProcessConfig, ProcessExecutor};
use cmdrun_prometheus::PrometheusMetrics;
use tracing::{info, warn};

use crate::config::{ExecutorKind, ServerConfig};

/// How the server starts a worker of its own.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// The running executable in `worker` mode.
    pub fn current_exe() -> anyhow::Result<Self> {
        let exe = std::env::current_exe().context("cannot locate the server executable")?;
        Ok(Self {
            program: exe.to_string_lossy().into_owned(),
            args: vec!["worker".to_string()],
        })
    }
}

/// Build the job service for `cfg`.
pub fn build_service(
    cfg: &ServerConfig,
    catalog: Arc<dyn Catalog>,
    worker: WorkerCommand,
    metrics: MetricsHandle,
) -> anyhow::Result<JobService> {
    cfg.validate()?;
    let cache = cfg.cache_config();
    let backend = cache.open().context("cannot open the status cache")?;
    let store = StatusStore::new(backend.clone(), StoreLimits::default());
    let admission = Admission::new(cfg.max_jobs);

    let executor: Arc<dyn IsolatedExecutor> = match cfg.executor {
        ExecutorKind::Process => {
            let proc_cfg = ProcessConfig::new(worker.program, cache).with_args(worker.args);
            Arc::new(
                ProcessExecutor::new(proc_cfg)?
                    .with_admission(admission)
                    .with_metrics(metrics.clone()),
            )
        }
        ExecutorKind::Task => Arc::new(
            TaskExecutor::new(JobContext {
                store: store.clone(),
                catalog: catalog.clone(),
                flush: FlushPolicy::default(),
                metrics: metrics.clone(),
            })
            .with_admission(admission),
        ),
    };
    info!(
        executor = executor.name(),
        cache = backend.name(),
        max_jobs = ?cfg.max_jobs,
        "job service ready"
    );

    let help = HelpCache::new(backend, cfg.help_ttl);
    Ok(JobService::new(store, executor, catalog, help, metrics))
}

/// API routes plus `GET /metrics`.
pub fn router(service: Arc<JobService>, metrics: Arc<PrometheusMetrics>) -> Router {
    let api = HttpApi::new(Arc::new(JobServiceAdapter::new(service))).router();
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics)
        .merge(api)
}

async fn render_metrics(State(metrics): State<Arc<PrometheusMetrics>>) -> Response {
    match metrics.render() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "metrics rendering failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
