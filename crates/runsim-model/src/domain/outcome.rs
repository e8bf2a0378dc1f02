use std::path::PathBuf;

use crate::Seed;

/// Result of one finished seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub seed: Seed,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    pub export_params: PathBuf,
    pub export_state: PathBuf,
    pub failed: bool,
    /// Why the seed failed, when the failure happened before or around the
    /// process (spawn error, non-zero exit, killed by signal).
    pub error: Option<String>,
}

impl RunOutcome {
    /// Both log files, stderr first.
    pub fn logs(&self) -> [&PathBuf; 2] {
        [&self.stderr, &self.stdout]
    }

    pub fn exports(&self) -> [&PathBuf; 2] {
        [&self.export_params, &self.export_state]
    }
}
