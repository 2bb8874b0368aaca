mod config;
mod error;
mod format;
mod level;
mod log;

pub use config::{LoggerConfig, LoggerOutput};
pub use error::LoggerError;
pub use format::LoggerFormat;
pub use level::LoggerLevel;

pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    match cfg.format {
        LoggerFormat::Text => log::Logger::text(cfg),
        LoggerFormat::Json => log::Logger::json(cfg),
        LoggerFormat::Journald => log::Logger::journald(cfg),
    }
}
