use std::sync::Arc;

use anyhow::Context;
use cmdrun_core::{Catalog, metrics::noop_metrics};
use cmdrun_exec::{exit_code, run_worker, worker::EXIT_BAD_REQUEST};
use cmdrun_observe::{LoggerConfig, LoggerOutput, logger_init};
use cmdrun_prometheus::PrometheusMetrics;
use cmdrun_server::{
    app::{WorkerCommand, build_service, router},
    commands,
    config::ServerConfig,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match std::env::args().nth(1).as_deref() {
        None | Some("serve") => serve().await,
        Some("worker") => std::process::exit(worker().await),
        Some(other) => anyhow::bail!("unknown mode '{other}' (expected: serve|worker)"),
    }
}

async fn serve() -> anyhow::Result<()> {
    let cfg = ServerConfig::from_env()?;
    logger_init(&LoggerConfig {
        format: cfg.log_format,
        level: cfg.log_level.clone(),
        ..Default::default()
    })?;

    let metrics = Arc::new(PrometheusMetrics::new()?);
    let catalog: Arc<dyn Catalog> = Arc::new(commands::registry()?);
    let service = build_service(&cfg, catalog, WorkerCommand::current_exe()?, metrics.clone())?;
    let app = router(Arc::new(service), metrics);

    let listener = TcpListener::bind(cfg.bind)
        .await
        .with_context(|| format!("cannot bind {}", cfg.bind))?;
    info!(addr = %listener.local_addr()?, "http server listening");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let token = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("shutting down...");
                    token.cancel();
                }
                Err(e) => warn!(error = %e, "cannot listen for ctrl-c"),
            }
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    info!("http server stopped");
    Ok(())
}

/// Worker mode: one job from stdin; the exit code reports the outcome.
async fn worker() -> i32 {
    // stdout is never written by a worker.
    let mut log = LoggerConfig::for_output(LoggerOutput::Stderr);
    if let Ok(cfg) = ServerConfig::from_env() {
        log.level = cfg.log_level;
        log.format = cfg.log_format;
    }
    let _ = logger_init(&log);

    let catalog: Arc<dyn Catalog> = match commands::registry() {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!(error = %e, "invalid catalog");
            return EXIT_BAD_REQUEST;
        }
    };
    match run_worker(tokio::io::stdin(), catalog, noop_metrics()).await {
        Ok(outcome) => exit_code(outcome),
        Err(e) => {
            error!(error = %e, "worker request failed");
            EXIT_BAD_REQUEST
        }
    }
}
