use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use runsim_model::Seed;
use tracing::{debug, warn};

use crate::util::{Signal, send_signal};

/// A live simulation process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub seed: Seed,
}

/// What [`ProcessRegistry::terminate_all`] did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TerminateReport {
    /// Processes that were live when termination started.
    pub targeted: usize,
    /// Signal deliveries that failed (usually: process already gone).
    pub failed_deliveries: usize,
}

/// Processes that have been spawned and not yet reaped, keyed by pid.
///
/// Cloning shares the same map. The lock is held only for the duration of an
/// insert, a delete, or a bulk signal pass; never across a process wait.
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    inner: Arc<Mutex<HashMap<u32, ProcessEntry>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, ProcessEntry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register(&self, entry: ProcessEntry) {
        self.lock().insert(entry.pid, entry);
        debug!(target: "runsim.registry", pid = entry.pid, seed = entry.seed, "process registered");
    }

    pub fn unregister(&self, pid: u32) -> Option<ProcessEntry> {
        let removed = self.lock().remove(&pid);
        if removed.is_some() {
            debug!(target: "runsim.registry", pid, "process unregistered");
        }
        removed
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.lock().contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<ProcessEntry> {
        self.lock().values().copied().collect()
    }

    /// Send `SIGTERM` and then `SIGKILL` to every live process.
    ///
    /// Delivery failures are logged and counted; they never abort the pass,
    /// since a target may exit between being listed and being signalled.
    pub fn terminate_all(&self) -> TerminateReport {
        let procs = self.lock();
        let mut report = TerminateReport {
            targeted: procs.len(),
            failed_deliveries: 0,
        };

        for entry in procs.values() {
            for signal in [Signal::Terminate, Signal::Kill] {
                if let Err(e) = send_signal(entry.pid, signal) {
                    report.failed_deliveries += 1;
                    warn!(
                        target: "runsim.registry",
                        pid = entry.pid,
                        seed = entry.seed,
                        signal = signal.name(),
                        error = %e,
                        "failed to send signal"
                    );
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn register_and_unregister() {
        let reg = ProcessRegistry::new();
        reg.register(ProcessEntry { pid: 10, seed: 1 });
        reg.register(ProcessEntry { pid: 11, seed: 2 });

        assert_eq!(reg.len(), 2);
        assert!(reg.contains(10));

        assert_eq!(reg.unregister(10), Some(ProcessEntry { pid: 10, seed: 1 }));
        assert_eq!(reg.unregister(10), None);
        assert!(!reg.contains(10));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn clones_share_state() {
        let reg = ProcessRegistry::new();
        let other = reg.clone();
        other.register(ProcessEntry { pid: 3, seed: 3 });
        assert!(reg.contains(3));
    }

    #[test]
    fn concurrent_insert_and_remove() {
        let reg = ProcessRegistry::new();
        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let reg = reg.clone();
                thread::spawn(move || {
                    for i in 0..100u32 {
                        let pid = t * 1000 + i;
                        reg.register(ProcessEntry {
                            pid,
                            seed: i64::from(pid),
                        });
                        let _ = reg.snapshot();
                        assert!(reg.unregister(pid).is_some());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(reg.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn terminate_all_signals_live_processes() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        let reg = ProcessRegistry::new();
        reg.register(ProcessEntry { pid, seed: 9 });

        let report = reg.terminate_all();
        assert_eq!(report.targeted, 1);
        assert_eq!(report.failed_deliveries, 0);

        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }

    #[cfg(unix)]
    #[test]
    fn terminate_all_tolerates_dead_pids() {
        let reg = ProcessRegistry::new();
        reg.register(ProcessEntry {
            pid: 4_194_304 + 7,
            seed: 1,
        });
        let report = reg.terminate_all();
        assert_eq!(report.targeted, 1);
        assert_eq!(report.failed_deliveries, 2);
    }
}
