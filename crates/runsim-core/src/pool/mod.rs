//! Bounded set of workers draining the seed queue.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use runsim_exec::{CommandBuilder, CommandSpec, ProcessSupervisor, StderrMode};
use runsim_model::{RunOutcome, SeedTask};
use tokio::{
    sync::mpsc,
    task::JoinSet,
    time::{Instant, interval_at},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::queue::SeedQueue;

const MIN_HEARTBEAT: Duration = Duration::from_millis(10);

/// What a failing seed does to the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Every seed runs; failures are collected and reported at the end.
    #[default]
    Batch,
    /// The first failure cancels the run. Stderr is captured and echoed.
    FailFast,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Requested concurrency. Zero is treated as one.
    pub jobs: usize,
    pub mode: FailureMode,
    /// Interval between progress log lines while simulations are running.
    pub heartbeat: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            jobs: 1,
            mode: FailureMode::Batch,
            heartbeat: Duration::from_secs(60),
        }
    }
}

/// Terminal state of a pool run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Completed,
    /// A seed failed in fail-fast mode.
    Aborted,
    /// The run was cancelled from outside (operator interrupt).
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolReport {
    pub state: PoolState,
    pub workers: usize,
}

/// Number of workers for `queued` tasks: never more than there is work.
pub fn effective_workers(jobs: usize, queued: usize) -> usize {
    jobs.max(1).min(queued)
}

pub struct WorkerPool {
    cfg: PoolConfig,
    supervisor: ProcessSupervisor,
    builder: Arc<dyn CommandBuilder>,
}

impl WorkerPool {
    pub fn new(
        cfg: PoolConfig,
        supervisor: ProcessSupervisor,
        builder: Arc<dyn CommandBuilder>,
    ) -> Self {
        Self {
            cfg,
            supervisor,
            builder,
        }
    }

    /// Drain `queue`, sending one outcome per started seed to `results`.
    ///
    /// Returns once every worker has stopped. `cancel` stops the run: no
    /// further seed starts and running processes are killed. In fail-fast
    /// mode the pool cancels the token itself on the first failure.
    pub async fn run(
        &self,
        queue: &SeedQueue,
        results: mpsc::Sender<RunOutcome>,
        cancel: CancellationToken,
    ) -> PoolReport {
        let workers = effective_workers(self.cfg.jobs, queue.len());
        info!(target: "runsim.pool", workers, seeds = queue.len(), "allocating workers");

        let aborted = Arc::new(AtomicBool::new(false));
        let mut set = JoinSet::new();
        for id in 0..workers {
            let worker = Worker {
                id,
                queue: queue.clone(),
                supervisor: self.supervisor.clone(),
                builder: Arc::clone(&self.builder),
                mode: self.cfg.mode,
                results: results.clone(),
                cancel: cancel.clone(),
                aborted: Arc::clone(&aborted),
            };
            set.spawn(worker.run());
        }
        drop(results);

        let started = Instant::now();
        let period = self.cfg.heartbeat.max(MIN_HEARTBEAT);
        let mut heartbeat = interval_at(started + period, period);
        loop {
            tokio::select! {
                joined = set.join_next() => match joined {
                    None => break,
                    Some(Ok(())) => {}
                    Some(Err(e)) => error!(target: "runsim.pool", error = %e, "worker task failed"),
                },
                _ = heartbeat.tick() => {
                    info!(
                        target: "runsim.pool",
                        elapsed_secs = started.elapsed().as_secs(),
                        running = self.supervisor.registry().len(),
                        queued = queue.len(),
                        "simulations in progress"
                    );
                }
            }
        }

        let state = if aborted.load(Ordering::SeqCst) {
            PoolState::Aborted
        } else if cancel.is_cancelled() {
            PoolState::Cancelled
        } else {
            PoolState::Completed
        };
        info!(target: "runsim.pool", ?state, elapsed_secs = started.elapsed().as_secs(), "all workers stopped");
        PoolReport { state, workers }
    }
}

struct Worker {
    id: usize,
    queue: SeedQueue,
    supervisor: ProcessSupervisor,
    builder: Arc<dyn CommandBuilder>,
    mode: FailureMode,
    results: mpsc::Sender<RunOutcome>,
    cancel: CancellationToken,
    aborted: Arc<AtomicBool>,
}

impl Worker {
    async fn run(self) {
        info!(target: "runsim.pool", worker = self.id, "worker is up");
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let Some(task) = self.queue.pop() else {
                break;
            };
            if self.cancel.is_cancelled() {
                warn!(target: "runsim.pool", worker = self.id, seed = task.seed, "run cancelled; seed discarded");
                break;
            }

            let outcome = self.execute(task).await;
            let failed = outcome.failed;
            if self.results.send(outcome).await.is_err() {
                warn!(target: "runsim.pool", worker = self.id, "result channel closed");
                break;
            }

            if failed && self.mode == FailureMode::FailFast && !self.cancel.is_cancelled() {
                error!(target: "runsim.pool", worker = self.id, "seed failed; aborting run");
                self.aborted.store(true, Ordering::SeqCst);
                self.cancel.cancel();
                break;
            }
        }
        info!(target: "runsim.pool", worker = self.id, "worker stopped");
    }

    async fn execute(&self, task: SeedTask) -> RunOutcome {
        let spec = self.builder.build(&task);
        let stderr_mode = match self.mode {
            FailureMode::Batch => StderrMode::File,
            FailureMode::FailFast => StderrMode::Capture,
        };

        let child = match self.supervisor.spawn(&spec, &task, stderr_mode) {
            Ok(child) => child,
            Err(e) => return self.fail(task, &spec, e.to_string(), None),
        };
        info!(
            target: "runsim.pool",
            worker = self.id,
            seed = task.seed,
            pid = child.pid(),
            stdout = %task.stdout.display(),
            stderr = %task.stderr.display(),
            "simulation started"
        );

        match child.wait(&self.cancel).await {
            Ok(report) if report.cancelled => {
                warn!(target: "runsim.pool", worker = self.id, seed = task.seed, "simulation killed");
                task.failed(Some("cancelled".to_string()))
            }
            Ok(report) => match report.check() {
                Ok(()) => {
                    info!(target: "runsim.pool", worker = self.id, seed = task.seed, "seed OK");
                    task.succeeded()
                }
                Err(e) => {
                    let stderr = report.stderr_text();
                    self.fail(task, &spec, e.to_string(), stderr)
                }
            },
            Err(e) => self.fail(task, &spec, e.to_string(), None),
        }
    }

    fn fail(
        &self,
        task: SeedTask,
        spec: &CommandSpec,
        reason: String,
        stderr: Option<String>,
    ) -> RunOutcome {
        error!(target: "runsim.pool", worker = self.id, seed = task.seed, %reason, "seed FAILED");
        info!(target: "runsim.pool", "to reproduce run: {spec}");
        if let Some(stderr) = stderr {
            for line in stderr.lines() {
                error!(target: "runsim.pool", seed = task.seed, "{line}");
            }
        }
        task.failed(Some(reason))
    }
}
