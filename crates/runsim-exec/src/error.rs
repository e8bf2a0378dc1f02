use std::path::PathBuf;

use thiserror::Error;

pub type ExecResult<T> = Result<T, ExecError>;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("non-zero exit code: {code}")]
    NonZeroExit { code: i32 },
    #[error("spawn {program} failed: {reason}")]
    Spawn { program: String, reason: String },
    #[error("cannot create log file {path}: {reason}")]
    LogFile { path: PathBuf, reason: String },
    #[error("wait failed: {0}")]
    Wait(String),
    #[error("killed by signal")]
    KilledBySignal,
    #[error("spawned process has no pid")]
    MissingPid,
    #[error("io error: {0}")]
    Io(String),
    #[error("cancelled")]
    Cancelled,
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}
