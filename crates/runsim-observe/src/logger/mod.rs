//! Process-wide `tracing` setup: console output in the chosen format, teed
//! into the run log when one is configured.

mod config;
mod error;
mod format;
mod log;

pub use config::{LoggerConfig, RUN_LOG_NAME, run_log_path};
pub use error::LoggerError;
pub use format::LoggerFormat;

/// Install the global subscriber described by `cfg`.
pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    match cfg.format {
        LoggerFormat::Text => log::Logger::text(cfg)?,
        LoggerFormat::Json => log::Logger::json(cfg)?,
        LoggerFormat::Journald => log::Logger::journald(cfg)?,
    }
    if let Some(path) = &cfg.run_log {
        tracing::debug!(target: "runsim.observe", path = %path.display(), "run log attached");
    }
    Ok(())
}
