use std::{
    fs::File,
    path::Path,
    sync::Mutex,
};

use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, fmt, fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError};

pub struct Logger;

impl Logger {
    pub fn text(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        let filter = mk_filter(&cfg.level)?;
        let fmt_layer = fmt::layer()
            .with_ansi(cfg.use_color)
            .with_target(cfg.with_targets)
            .with_timer(mk_timer());
        let file_layer = mk_file(cfg)?.map(|file| {
            fmt::layer()
                .with_ansi(false)
                .with_target(cfg.with_targets)
                .with_timer(mk_timer())
                .with_writer(file)
        });

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .with(file_layer);
        init_with(subscriber)
    }

    pub fn json(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        let filter = mk_filter(&cfg.level)?;
        let fmt_layer = fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(cfg.with_targets)
            .with_timer(mk_timer());
        let file_layer = mk_file(cfg)?.map(|file| {
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_target(cfg.with_targets)
                .with_timer(mk_timer())
                .with_writer(file)
        });

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .with(file_layer);
        init_with(subscriber)
    }

    pub fn journald(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        let filter = mk_filter(&cfg.level)?;
        mk_journald(filter, cfg)
    }
}

fn mk_filter(level: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(level).map_err(|_| LoggerError::InvalidLogLevel(level.to_string()))
}

fn mk_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

/// Open the run log for appending, if one is configured.
fn mk_file(cfg: &LoggerConfig) -> Result<Option<Mutex<File>>, LoggerError> {
    cfg.run_log.as_deref().map(open_append).transpose()
}

fn open_append(path: &Path) -> Result<Mutex<File>, LoggerError> {
    File::options()
        .create(true)
        .append(true)
        .open(path)
        .map(Mutex::new)
        .map_err(|e| LoggerError::RunLog {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn as_error(e: impl std::fmt::Display) -> LoggerError {
    let s = e.to_string();
    if s.contains("SetGlobalDefaultError") || s.contains("already") {
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
fn mk_journald(filter: EnvFilter, cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let journald = tracing_journald::layer()
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?;
    let file_layer = mk_file(cfg)?.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_target(cfg.with_targets)
            .with_timer(mk_timer())
            .with_writer(file)
    });
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(journald)
        .with(file_layer);
    init_with(subscriber)
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn mk_journald(_filter: EnvFilter, _cfg: &LoggerConfig) -> Result<(), LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}

#[cfg(test)]
mod tests {
    use tracing::info;

    use super::*;
    use crate::logger::{config::run_log_path, format::LoggerFormat};

    #[test]
    fn bad_level_is_rejected() {
        assert!(matches!(
            mk_filter("runsim=loud"),
            Err(LoggerError::InvalidLogLevel(_))
        ));
        assert!(mk_filter("runsim.pool=debug,info").is_ok());
    }

    #[test]
    fn unwritable_log_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LoggerConfig {
            run_log: Some(dir.path().join("missing/dir/runsim_log")),
            ..LoggerConfig::default()
        };
        assert!(matches!(mk_file(&cfg), Err(LoggerError::RunLog { .. })));
    }

    // The only test in this crate that installs the global subscriber.
    #[test]
    fn run_log_receives_events_and_second_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = run_log_path(dir.path());
        let cfg = LoggerConfig {
            format: LoggerFormat::Text,
            use_color: false,
            ..LoggerConfig::default()
        }
        .in_run_dir(dir.path());

        Logger::text(&cfg).unwrap();
        info!(target: "runsim.test", seed = 42, "written to the run log");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("written to the run log"));
        assert!(contents.contains("seed=42"));
        assert!(!contents.contains('\u{1b}'), "no ANSI escapes in the file");

        assert!(Logger::text(&cfg).is_err());
    }
}
