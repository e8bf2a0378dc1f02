//! Spawning and reaping of simulation processes.
//!
//! [`ProcessSupervisor::spawn`] starts one process for a seed task and
//! registers it; [`SupervisedChild::wait`] reaps it and removes the
//! registration, so the registry always holds exactly the processes that
//! are started and not yet reaped.

use std::{
    fs::File,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
};

use runsim_model::SeedTask;
use tokio::{io::AsyncReadExt, process::Child, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    CommandSpec, ProcessEntry, ProcessRegistry,
    error::{ExecError, ExecResult},
    util::kill_graceful,
};

/// Where a child's stderr goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrMode {
    /// Straight into the task's stderr file.
    File,
    /// Through a pipe, kept in memory so it can be echoed to the operator.
    /// The captured bytes are still written to the stderr file afterwards.
    Capture,
}

/// Spawns processes and keeps the shared registry in sync with them.
#[derive(Debug, Clone, Default)]
pub struct ProcessSupervisor {
    registry: ProcessRegistry,
}

impl ProcessSupervisor {
    pub fn new(registry: ProcessRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Start `spec` for `task`, wiring stdout to the task's stdout file.
    pub fn spawn(
        &self,
        spec: &CommandSpec,
        task: &SeedTask,
        mode: StderrMode,
    ) -> ExecResult<SupervisedChild> {
        let stdout = create_log(&task.stdout)?;
        let stderr = match mode {
            StderrMode::File => Stdio::from(create_log(&task.stderr)?),
            StderrMode::Capture => Stdio::piped(),
        };

        let mut cmd = spec.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(stderr)
            .kill_on_drop(true);

        trace!(target: "runsim.exec", program = %spec.program, args = ?spec.args, "spawn");
        let child = cmd.spawn().map_err(|e| ExecError::Spawn {
            program: spec.program.clone(),
            reason: e.to_string(),
        })?;
        let pid = child.id().ok_or(ExecError::MissingPid)?;

        self.registry.register(ProcessEntry {
            pid,
            seed: task.seed,
        });

        Ok(SupervisedChild {
            child,
            registration: Registration {
                registry: self.registry.clone(),
                pid,
            },
            stderr_path: task.stderr.clone(),
        })
    }
}

fn create_log(path: &Path) -> ExecResult<File> {
    File::create(path).map_err(|e| ExecError::LogFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Removes the registry entry when dropped.
#[derive(Debug)]
struct Registration {
    registry: ProcessRegistry,
    pid: u32,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(self.pid);
    }
}

/// A registered, running child process.
#[derive(Debug)]
pub struct SupervisedChild {
    child: Child,
    registration: Registration,
    stderr_path: PathBuf,
}

impl SupervisedChild {
    pub fn pid(&self) -> u32 {
        self.registration.pid
    }

    /// Wait for the process to exit.
    ///
    /// When `cancel` fires first the process is terminated and reaped; the
    /// report is then marked as cancelled. The registry entry is removed
    /// right after the process has been reaped, whichever way it ended.
    pub async fn wait(self, cancel: &CancellationToken) -> ExecResult<ExitReport> {
        let Self {
            mut child,
            registration,
            stderr_path,
        } = self;

        let reader = child.stderr.take().map(|mut pipe| -> JoinHandle<Vec<u8>> {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                buf
            })
        });

        let (status, cancelled) = tokio::select! {
            status = child.wait() => (status, false),
            _ = cancel.cancelled() => {
                debug!(target: "runsim.exec", pid = registration.pid, "cancelled; killing child");
                let _ = kill_graceful(&mut child).await;
                (child.wait().await, true)
            }
        };
        drop(registration);
        let status = status.map_err(|e| ExecError::Wait(e.to_string()))?;

        let stderr = match reader {
            Some(handle) => {
                let buf = handle.await.unwrap_or_default();
                if let Err(e) = tokio::fs::write(&stderr_path, &buf).await {
                    warn!(
                        target: "runsim.exec",
                        path = %stderr_path.display(),
                        error = %e,
                        "failed to persist captured stderr"
                    );
                }
                Some(buf)
            }
            None => None,
        };

        Ok(ExitReport {
            status,
            cancelled,
            stderr,
        })
    }
}

/// How a supervised process ended.
#[derive(Debug)]
pub struct ExitReport {
    pub status: ExitStatus,
    /// The process was killed because the run was cancelled.
    pub cancelled: bool,
    /// Captured stderr, present only in [`StderrMode::Capture`].
    pub stderr: Option<Vec<u8>>,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        self.status.success() && !self.cancelled
    }

    /// `Ok` on success, otherwise the reason the process counts as failed.
    pub fn check(&self) -> ExecResult<()> {
        if self.cancelled {
            return Err(ExecError::Cancelled);
        }
        if self.status.success() {
            return Ok(());
        }
        match self.status.code() {
            Some(code) => Err(ExecError::NonZeroExit { code }),
            None => Err(ExecError::KilledBySignal),
        }
    }

    /// Captured stderr as lossy UTF-8, if any was captured.
    pub fn stderr_text(&self) -> Option<String> {
        self.stderr
            .as_deref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use runsim_model::RunLayout;

    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new("sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn stdout_and_stderr_go_to_files() {
        let dir = tempfile::tempdir().unwrap();
        let task = RunLayout::with_stamp(dir.path(), "t").task(1);
        let sup = ProcessSupervisor::default();

        let child = sup
            .spawn(&sh("echo out; echo err >&2"), &task, StderrMode::File)
            .unwrap();
        let pid = child.pid();
        assert!(sup.registry().contains(pid));

        let report = child.wait(&CancellationToken::new()).await.unwrap();
        assert!(report.success());
        assert!(report.check().is_ok());
        assert!(report.stderr.is_none());
        assert!(!sup.registry().contains(pid));

        assert_eq!(std::fs::read_to_string(&task.stdout).unwrap(), "out\n");
        assert_eq!(std::fs::read_to_string(&task.stderr).unwrap(), "err\n");
    }

    #[tokio::test]
    async fn capture_mode_keeps_stderr_and_persists_it() {
        let dir = tempfile::tempdir().unwrap();
        let task = RunLayout::with_stamp(dir.path(), "t").task(2);
        let sup = ProcessSupervisor::default();

        let report = sup
            .spawn(&sh("echo boom >&2; exit 3"), &task, StderrMode::Capture)
            .unwrap()
            .wait(&CancellationToken::new())
            .await
            .unwrap();

        assert!(!report.success());
        assert!(matches!(report.check(), Err(ExecError::NonZeroExit { code: 3 })));
        assert_eq!(report.stderr_text().as_deref(), Some("boom\n"));
        assert_eq!(std::fs::read_to_string(&task.stderr).unwrap(), "boom\n");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let task = RunLayout::with_stamp(dir.path(), "t").task(3);
        let sup = ProcessSupervisor::default();

        let err = sup
            .spawn(
                &CommandSpec::new("definitely-not-a-real-binary-runsim"),
                &task,
                StderrMode::File,
            )
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
        assert!(sup.registry().is_empty());
    }

    #[tokio::test]
    async fn cancellation_kills_and_unregisters() {
        let dir = tempfile::tempdir().unwrap();
        let task = RunLayout::with_stamp(dir.path(), "t").task(4);
        let sup = ProcessSupervisor::default();
        let cancel = CancellationToken::new();

        let child = sup.spawn(&sh("sleep 30"), &task, StderrMode::File).unwrap();
        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { child.wait(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sup.registry().len(), 1);
        cancel.cancel();

        let report = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(report.cancelled);
        assert!(matches!(report.check(), Err(ExecError::Cancelled)));
        assert!(sup.registry().is_empty());
    }
}
