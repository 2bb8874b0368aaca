//! Server settings read from `CMDRUN_*` environment variables.
use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use cmdrun_core::{CacheConfig, catalog::DEFAULT_HELP_TTL};
use cmdrun_observe::{LoggerError, LoggerFormat, LoggerLevel};
use thiserror::Error;

pub const ENV_BIND: &str = "CMDRUN_BIND";
pub const ENV_EXECUTOR: &str = "CMDRUN_EXECUTOR";
pub const ENV_CACHE: &str = "CMDRUN_CACHE";
pub const ENV_CACHE_DIR: &str = "CMDRUN_CACHE_DIR";
pub const ENV_MAX_JOBS: &str = "CMDRUN_MAX_JOBS";
pub const ENV_HELP_TTL_SECS: &str = "CMDRUN_HELP_TTL_SECS";
pub const ENV_LOG_LEVEL: &str = "CMDRUN_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "CMDRUN_LOG_FORMAT";

const DEFAULT_BIND: &str = "127.0.0.1:8080";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("the process executor needs the file cache; set {ENV_CACHE}=file")]
    ProcessNeedsSharedCache,
    #[error(transparent)]
    Logger(#[from] LoggerError),
}

/// Where jobs run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    /// One worker process per job.
    Process,
    /// A tokio task inside the server.
    Task,
}

impl FromStr for ExecutorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "process" | "proc" => Ok(ExecutorKind::Process),
            "task" => Ok(ExecutorKind::Task),
            _ => Err("expected process|task".into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Memory,
    File,
}

impl FromStr for CacheKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheKind::Memory),
            "file" => Ok(CacheKind::File),
            _ => Err("expected memory|file".into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub executor: ExecutorKind,
    pub cache: CacheKind,
    pub cache_dir: PathBuf,
    /// Concurrent job limit; `None` is unbounded.
    pub max_jobs: Option<usize>,
    /// Help text lifetime; `None` keeps it until the cache is cleared.
    pub help_ttl: Option<Duration>,
    pub log_level: LoggerLevel,
    pub log_format: LoggerFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            executor: ExecutorKind::Process,
            cache: CacheKind::File,
            cache_dir: std::env::temp_dir().join("cmdrun-cache"),
            max_jobs: None,
            help_ttl: Some(DEFAULT_HELP_TTL),
            log_level: LoggerLevel::default(),
            log_format: LoggerFormat::Text,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let var = |name: &'static str| lookup(name).filter(|v| !v.trim().is_empty());

        cfg.bind = parse(ENV_BIND, var(ENV_BIND).as_deref().unwrap_or(DEFAULT_BIND))?;
        if let Some(v) = var(ENV_EXECUTOR) {
            cfg.executor = parse(ENV_EXECUTOR, &v)?;
        }
        if let Some(v) = var(ENV_CACHE) {
            cfg.cache = parse(ENV_CACHE, &v)?;
        }
        if let Some(v) = var(ENV_CACHE_DIR) {
            cfg.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = var(ENV_MAX_JOBS) {
            let max: usize = parse(ENV_MAX_JOBS, &v)?;
            cfg.max_jobs = (max > 0).then_some(max);
        }
        if let Some(v) = var(ENV_HELP_TTL_SECS) {
            let secs: u64 = parse(ENV_HELP_TTL_SECS, &v)?;
            cfg.help_ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(v) = var(ENV_LOG_LEVEL) {
            cfg.log_level = v.parse()?;
        }
        if let Some(v) = var(ENV_LOG_FORMAT) {
            cfg.log_format = v.parse()?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executor == ExecutorKind::Process && self.cache != CacheKind::File {
            return Err(ConfigError::ProcessNeedsSharedCache);
        }
        Ok(())
    }

    pub fn cache_config(&self) -> CacheConfig {
        match self.cache {
            CacheKind::Memory => CacheConfig::default(),
            CacheKind::File => CacheConfig::file(&self.cache_dir),
        }
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_run_workers_on_the_file_cache() {
        let cfg = from(&[]).unwrap();
        assert_eq!(cfg.executor, ExecutorKind::Process);
        assert_eq!(cfg.cache, CacheKind::File);
        assert_eq!(cfg.bind.port(), 8080);
        assert_eq!(cfg.max_jobs, None);
        assert_eq!(cfg.help_ttl, Some(DEFAULT_HELP_TTL));
        assert!(cfg.cache_config().shares_across_processes());
    }

    #[test]
    fn variables_override_defaults() {
        let cfg = from(&[
            (ENV_BIND, "0.0.0.0:9000"),
            (ENV_EXECUTOR, "task"),
            (ENV_CACHE, "memory"),
            (ENV_MAX_JOBS, "4"),
            (ENV_HELP_TTL_SECS, "0"),
            (ENV_LOG_LEVEL, "debug,cmdrun.store=trace"),
            (ENV_LOG_FORMAT, "json"),
        ])
        .unwrap();
        assert_eq!(cfg.bind.port(), 9000);
        assert_eq!(cfg.executor, ExecutorKind::Task);
        assert_eq!(cfg.cache, CacheKind::Memory);
        assert_eq!(cfg.max_jobs, Some(4));
        assert_eq!(cfg.help_ttl, None);
        assert_eq!(cfg.log_format, LoggerFormat::Json);
    }

    #[test]
    fn zero_max_jobs_is_unbounded() {
        let cfg = from(&[(ENV_MAX_JOBS, "0")]).unwrap();
        assert_eq!(cfg.max_jobs, None);
    }

    #[test]
    fn process_executor_rejects_memory_cache() {
        let err = from(&[(ENV_CACHE, "memory")]).unwrap_err();
        assert!(matches!(err, ConfigError::ProcessNeedsSharedCache));
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let err = from(&[(ENV_MAX_JOBS, "many")]).unwrap_err();
        assert!(err.to_string().starts_with("CMDRUN_MAX_JOBS: invalid value 'many'"));

        assert!(matches!(
            from(&[(ENV_EXECUTOR, "thread")]),
            Err(ConfigError::Invalid { var: ENV_EXECUTOR, .. })
        ));
        assert!(matches!(
            from(&[(ENV_LOG_FORMAT, "xml")]),
            Err(ConfigError::Logger(LoggerError::InvalidFormat(_)))
        ));
    }
}
