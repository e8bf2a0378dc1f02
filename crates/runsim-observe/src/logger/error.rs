use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format `{0}` (expected text, json or journald)")]
    InvalidFormat(String),
    #[error("journald logging needs Linux and the `journald` feature")]
    JournaldNotSupported,
    #[error("a global logger is already installed")]
    AlreadyInitialized,
    #[error("logger init failed: {0}")]
    InitializationFailed(String),
    #[error("invalid log filter `{0}`")]
    InvalidLogLevel(String),
    #[error("cannot open run log {path}: {reason}")]
    RunLog { path: PathBuf, reason: String },
}
