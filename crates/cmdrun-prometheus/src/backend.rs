use std::time::Duration;

use cmdrun_core::{JobOutcome, MetricsBackend};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("metrics output is not utf-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Job metrics registered in a private [`Registry`].
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    started: IntCounter,
    completed: IntCounterVec,
    duration: Histogram,
    store_errors: IntCounterVec,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_registry(Registry::new())
    }

    /// Register the metrics into an existing registry.
    pub fn with_registry(registry: Registry) -> Result<Self, MetricsError> {
        let started = IntCounter::with_opts(Opts::new(
            "cmdrun_jobs_started_total",
            "Jobs handed to an executor",
        ))?;
        let completed = IntCounterVec::new(
            Opts::new("cmdrun_jobs_completed_total", "Jobs that reached a terminal state"),
            &["outcome"],
        )?;
        // Demo jobs run from seconds to a minute; real ones may take much longer.
        let duration = Histogram::with_opts(
            HistogramOpts::new("cmdrun_job_duration_seconds", "Wall time of a job")
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 1800.0, 3600.0]),
        )?;
        let store_errors = IntCounterVec::new(
            Opts::new("cmdrun_store_errors_total", "Failed status store operations"),
            &["kind"],
        )?;

        registry.register(Box::new(started.clone()))?;
        registry.register(Box::new(completed.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(store_errors.clone()))?;

        Ok(Self {
            registry,
            started,
            completed,
            duration,
            store_errors,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_job_started(&self) {
        self.started.inc();
    }

    fn record_job_completed(&self, outcome: JobOutcome, duration: Duration) {
        self.completed.with_label_values(&[outcome.as_str()]).inc();
        self.duration.observe(duration.as_secs_f64());
    }

    fn record_store_error(&self, kind: &'static str) {
        self.store_errors.with_label_values(&[kind]).inc();
    }
}
