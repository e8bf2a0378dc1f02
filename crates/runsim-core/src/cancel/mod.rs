//! Turns an operator interrupt into an orderly stop of the run.

mod signals;
pub use signals::wait_for_shutdown_signal;

use std::{future::Future, io};

use runsim_exec::{ProcessRegistry, TerminateReport};
use runsim_model::Seed;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::queue::SeedQueue;

/// What the watcher did after an interrupt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interrupted {
    /// Seeds removed from the queue before they started.
    pub discarded: Vec<Seed>,
    pub terminated: TerminateReport,
}

pub struct CancellationWatcher {
    queue: SeedQueue,
    registry: ProcessRegistry,
    cancel: CancellationToken,
}

impl CancellationWatcher {
    pub fn new(queue: SeedQueue, registry: ProcessRegistry, cancel: CancellationToken) -> Self {
        Self {
            queue,
            registry,
            cancel,
        }
    }

    /// Wait for `signal` or for `finished`, whichever comes first.
    ///
    /// On `signal` the run is interrupted (see [`interrupt`](Self::interrupt)).
    /// On `finished` the watcher returns `None` without touching anything.
    pub async fn watch<S>(self, signal: S, finished: CancellationToken) -> Option<Interrupted>
    where
        S: Future<Output = io::Result<()>>,
    {
        tokio::select! {
            res = signal => {
                if let Err(e) = res {
                    error!(target: "runsim.cancel", error = %e, "failed to listen for shutdown signals");
                    finished.cancelled().await;
                    return None;
                }
            }
            _ = finished.cancelled() => return None,
        }
        Some(self.interrupt())
    }

    /// Cancel the run, drop every queued seed and kill every live process.
    ///
    /// The token is cancelled before the queue is drained, so a worker that
    /// pops concurrently discards its task instead of starting it.
    pub fn interrupt(&self) -> Interrupted {
        warn!(target: "runsim.cancel", "shutdown requested; stopping the run");
        self.cancel.cancel();

        info!(target: "runsim.cancel", "draining seed queue");
        let discarded: Vec<Seed> = self
            .queue
            .drain()
            .into_iter()
            .map(|task| {
                info!(target: "runsim.cancel", seed = task.seed, "seed discarded");
                task.seed
            })
            .collect();

        info!(target: "runsim.cancel", live = self.registry.len(), "killing remaining processes");
        let terminated = self.registry.terminate_all();

        Interrupted {
            discarded,
            terminated,
        }
    }
}
