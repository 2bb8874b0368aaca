use std::{fmt, str::FromStr};

use tracing_subscriber::EnvFilter;

use crate::logger::error::LoggerError;

/// `EnvFilter` directive checked at parse time, e.g. `info` or `info,cmdrun.store=debug`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerLevel(String);

impl Default for LoggerLevel {
    fn default() -> Self {
        Self("info".to_string())
    }
}

impl LoggerLevel {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn filter(&self) -> Result<EnvFilter, LoggerError> {
        EnvFilter::try_new(&self.0).map_err(|_| LoggerError::InvalidLogLevel(self.0.clone()))
    }
}

impl FromStr for LoggerLevel {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = Self(s.trim().to_string());
        if level.0.is_empty() {
            return Err(LoggerError::InvalidLogLevel(s.to_string()));
        }
        level.filter()?;
        Ok(level)
    }
}

impl fmt::Display for LoggerLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_targeted_directives() {
        assert_eq!("debug".parse::<LoggerLevel>().unwrap().as_str(), "debug");
        assert!("warn,cmdrun.store=trace".parse::<LoggerLevel>().is_ok());
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            "info,cmdrun=notalevel".parse::<LoggerLevel>(),
            Err(LoggerError::InvalidLogLevel(_))
        ));
        assert!("  ".parse::<LoggerLevel>().is_err());
    }
}
