use std::path::{Path, PathBuf};

use crate::logger::format::LoggerFormat;

/// File name of the run log inside a run directory.
pub const RUN_LOG_NAME: &str = "runsim_log";

pub fn run_log_path(run_dir: &Path) -> PathBuf {
    run_dir.join(RUN_LOG_NAME)
}

/// Console logging plus an optional run log.
///
/// The run log gets every event the console gets, without colour. It is
/// opened for appending.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directives, e.g. `info,runsim.pool=debug`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
    pub run_log: Option<PathBuf>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color: atty::is(atty::Stream::Stdout),
            run_log: None,
        }
    }
}

impl LoggerConfig {
    /// Tee events into `<run_dir>/runsim_log`.
    pub fn in_run_dir(mut self, run_dir: &Path) -> Self {
        self.run_log = Some(run_log_path(run_dir));
        self
    }
}
