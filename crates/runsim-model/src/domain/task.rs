use std::path::{Path, PathBuf};

use time::{OffsetDateTime, macros::format_description};

use crate::{ModelError, RunOutcome, Seed};

/// Per-run file naming.
///
/// Every task of a run writes into the same directory; the timestamp is
/// taken once so all log files of a run share it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    dir: PathBuf,
    stamp: String,
}

impl RunLayout {
    /// Layout rooted at `dir`, stamped with the current local time.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ModelError> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let stamp = now
            .format(format_description!(
                "[month]-[day]-[year]_[hour][minute][second]"
            ))
            .map_err(|e| ModelError::Timestamp(e.to_string()))?;
        Ok(Self::with_stamp(dir, stamp))
    }

    pub fn with_stamp(dir: impl Into<PathBuf>, stamp: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stamp: stamp.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn log_stem(&self, seed: Seed) -> String {
        format!("app-simulation-seed-{seed}-date-{}", self.stamp)
    }

    /// Build the work item for one seed.
    pub fn task(&self, seed: Seed) -> SeedTask {
        let stem = self.log_stem(seed);
        SeedTask {
            seed,
            stdout: self.dir.join(format!("{stem}.stdout")),
            stderr: self.dir.join(format!("{stem}.stderr")),
            export_params: self.dir.join(format!("sim_params-{seed}.json")),
            export_state: self.dir.join(format!("sim_state-{seed}.json")),
        }
    }
}

/// One unit of work: a seed plus the files its process writes to.
///
/// A task carries no outcome. Completing it consumes the task and yields a
/// [`RunOutcome`], so the failure flag is set exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedTask {
    pub seed: Seed,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    pub export_params: PathBuf,
    pub export_state: PathBuf,
}

impl SeedTask {
    pub fn succeeded(self) -> RunOutcome {
        self.finish(false, None)
    }

    pub fn failed(self, error: Option<String>) -> RunOutcome {
        self.finish(true, error)
    }

    fn finish(self, failed: bool, error: Option<String>) -> RunOutcome {
        RunOutcome {
            seed: self.seed,
            stdout: self.stdout,
            stderr: self.stderr,
            export_params: self.export_params,
            export_state: self.export_state,
            failed,
            error,
        }
    }
}
