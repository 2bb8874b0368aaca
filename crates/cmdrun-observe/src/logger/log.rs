use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, time::OffsetTime, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::logger::{
    config::{LoggerConfig, LoggerOutput},
    error::LoggerError,
};

pub struct Logger;

impl Logger {
    pub fn text(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        let filter = cfg.level.filter()?;
        let fmt_layer = fmt::layer()
            .with_writer(mk_writer(cfg.output))
            .with_ansi(cfg.use_color)
            .with_target(cfg.with_targets)
            .with_timer(mk_timer());

        let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
        init_with(subscriber)
    }

    pub fn json(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        let filter = cfg.level.filter()?;
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(mk_writer(cfg.output))
            .with_ansi(false)
            .with_target(cfg.with_targets)
            .with_timer(mk_timer());

        let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
        init_with(subscriber)
    }

    pub fn journald(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        let filter = cfg.level.filter()?;
        mk_journald(filter)
    }
}

fn mk_writer(output: LoggerOutput) -> BoxMakeWriter {
    match output {
        LoggerOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LoggerOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
    }
}

fn mk_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn as_error(e: impl std::fmt::Display + std::fmt::Debug) -> LoggerError {
    let s = e.to_string();
    if format!("{e:?}").contains("SetGlobalDefaultError") || s.contains("already") {
        LoggerError::AlreadyInitialized
    } else {
        LoggerError::InitializationFailed(s)
    }
}

fn init_with<S>(subscriber: S) -> Result<(), LoggerError>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber.try_init().map_err(as_error)
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn mk_journald(filter: EnvFilter) -> Result<(), LoggerError> {
    let journald = tracing_journald::layer()
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?;
    let subscriber = tracing_subscriber::registry().with(filter).with(journald);
    init_with(subscriber)
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn mk_journald(_filter: EnvFilter) -> Result<(), LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::format::LoggerFormat;

    #[test]
    fn second_init_reports_already_initialized() {
        let cfg = LoggerConfig {
            format: LoggerFormat::Json,
            ..LoggerConfig::for_output(LoggerOutput::Stderr)
        };
        let first = Logger::json(&cfg);
        let second = Logger::text(&cfg);
        assert!(first.is_ok() || matches!(first, Err(LoggerError::AlreadyInitialized)));
        assert!(matches!(second, Err(LoggerError::AlreadyInitialized)));
    }

    #[cfg(not(all(target_os = "linux", feature = "journald")))]
    #[test]
    fn journald_without_feature_is_unsupported() {
        assert!(matches!(
            Logger::journald(&LoggerConfig::default()),
            Err(LoggerError::JournaldNotSupported)
        ));
    }
}
