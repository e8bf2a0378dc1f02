//! One complete run: queue, watcher, pool, then reporting.

use std::{future::Future, io, path::PathBuf, sync::Arc};

use runsim_exec::{CommandBuilder, ProcessRegistry, ProcessSupervisor};
use runsim_model::{RunLayout, RunOutcome, Seed, resolve_seeds};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    aggregate::ResultAggregator,
    cancel::{CancellationWatcher, Interrupted},
    error::CoreError,
    notify::{Notice, Publisher},
    pool::{PoolConfig, PoolState, WorkerPool},
    queue::SeedQueue,
};

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub pool: PoolConfig,
    pub layout: RunLayout,
    pub host_id: String,
}

/// Uploads results and publishes notices for a run.
pub struct Reporter {
    aggregator: ResultAggregator,
    publisher: Publisher,
    run_log: Option<PathBuf>,
}

impl Reporter {
    pub fn new(aggregator: ResultAggregator, publisher: Publisher) -> Self {
        Self {
            aggregator,
            publisher,
            run_log: None,
        }
    }

    /// Upload `path` after every report.
    pub fn with_run_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.run_log = Some(path.into());
        self
    }

    fn host_id(&self) -> &str {
        self.aggregator.host_id()
    }

    /// Bundle and upload `outcomes`, then publish the links.
    ///
    /// When bundling or uploading fails the failure itself is published and
    /// returned.
    pub async fn report_results(&self, outcomes: &[RunOutcome], failed: bool) -> Result<(), CoreError> {
        let res = match self.aggregator.publish(outcomes).await {
            Ok(links) => {
                self.publisher
                    .publish(&Notice::finished(self.host_id(), links), failed)
                    .await;
                Ok(())
            }
            Err(e) => {
                error!(target: "runsim.report", error = %e, "publishing artifacts failed");
                self.publisher
                    .publish(&Notice::error(self.host_id(), "publish artifacts", &e), true)
                    .await;
                Err(e)
            }
        };
        self.upload_run_log().await;
        res
    }

    /// Publish a failure that stopped the run before or outside the pool.
    pub async fn report_error(&self, what: &str, err: impl std::fmt::Display) {
        self.publisher
            .publish(&Notice::error(self.host_id(), what, err), true)
            .await;
        self.upload_run_log().await;
    }

    pub async fn report_interrupt(&self, interrupted: &Interrupted) {
        let reason = format!(
            "run cancelled by operator, {} seeds discarded, {} processes killed",
            interrupted.discarded.len(),
            interrupted.terminated.targeted
        );
        self.report_error("interrupted", reason).await;
    }

    /// Upload the run log; failures are only logged.
    pub async fn upload_run_log(&self) {
        let Some(path) = &self.run_log else {
            return;
        };
        if let Err(e) = self.aggregator.upload_file(path).await {
            warn!(target: "runsim.report", error = %e, path = %path.display(), "run log upload failed");
        }
    }
}

const REPORT_INTERRUPTED: &str = "interrupted while reporting";

/// Await `work` unless `shutdown` fires first. A listener that fails to
/// install never fires.
async fn until_shutdown<T>(
    work: impl Future<Output = T>,
    shutdown: impl Future<Output = io::Result<()>>,
) -> Option<T> {
    let shutdown = async {
        if let Err(e) = shutdown.await {
            warn!(target: "runsim.run", error = %e, "shutdown listener failed");
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        out = work => Some(out),
        () = shutdown => {
            warn!(target: "runsim.run", "interrupted while reporting, results not published");
            None
        }
    }
}

/// Result of [`Orchestrator::run`].
#[derive(Debug)]
pub struct RunSummary {
    pub state: PoolState,
    pub workers: usize,
    pub outcomes: Vec<RunOutcome>,
    pub interrupted: Option<Interrupted>,
    /// Set when results could not be published.
    pub report_error: Option<String>,
}

impl RunSummary {
    pub fn failed_seeds(&self) -> Vec<Seed> {
        self.outcomes
            .iter()
            .filter(|o| o.failed)
            .map(|o| o.seed)
            .collect()
    }

    pub fn any_failed(&self) -> bool {
        self.state != PoolState::Completed || self.outcomes.iter().any(|o| o.failed)
    }

    /// `0` when every seed passed and results were published, `1` otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.any_failed() || self.report_error.is_some() {
            1
        } else {
            0
        }
    }
}

pub struct Orchestrator {
    cfg: RunConfig,
    builder: Arc<dyn CommandBuilder>,
    registry: ProcessRegistry,
    reporter: Option<Reporter>,
}

impl Orchestrator {
    pub fn new(cfg: RunConfig, builder: Arc<dyn CommandBuilder>) -> Self {
        Self {
            cfg,
            builder,
            registry: ProcessRegistry::new(),
            reporter: None,
        }
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    pub fn reporter(&self) -> Option<&Reporter> {
        self.reporter.as_ref()
    }

    /// Resolve the seed list, then [`run`](Self::run) it.
    ///
    /// An invalid override is reported and returned before anything starts.
    pub async fn run_with_override<F, S>(
        &self,
        override_list: Option<&str>,
        shutdown: F,
    ) -> Result<RunSummary, CoreError>
    where
        F: Fn() -> S,
        S: Future<Output = io::Result<()>> + Send + 'static,
    {
        let seeds = match resolve_seeds(override_list) {
            Ok(seeds) => seeds,
            Err(e) => {
                error!(target: "runsim.run", error = %e, "invalid seed list");
                if let Some(reporter) = &self.reporter {
                    until_shutdown(reporter.report_error("build seed list", &e), shutdown()).await;
                }
                return Err(e.into());
            }
        };
        Ok(self.run(&seeds, shutdown).await)
    }

    /// Run every seed, watching for an operator interrupt, then report the
    /// results.
    ///
    /// `shutdown` is called once for the run and once more for the
    /// reporting phase; an interrupt while reporting abandons the report.
    pub async fn run<F, S>(&self, seeds: &[Seed], shutdown: F) -> RunSummary
    where
        F: Fn() -> S,
        S: Future<Output = io::Result<()>> + Send + 'static,
    {
        info!(
            target: "runsim.run",
            host = %self.cfg.host_id,
            seeds = seeds.len(),
            dir = %self.cfg.layout.dir().display(),
            "starting run"
        );
        let queue = SeedQueue::populate(seeds, &self.cfg.layout);
        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();

        let watcher = CancellationWatcher::new(queue.clone(), self.registry.clone(), cancel.clone());
        let watch = tokio::spawn(watcher.watch(shutdown(), finished.clone()));

        let (tx, mut rx) = mpsc::channel(queue.len().max(1));
        let pool = WorkerPool::new(
            self.cfg.pool.clone(),
            ProcessSupervisor::new(self.registry.clone()),
            Arc::clone(&self.builder),
        );
        let report = pool.run(&queue, tx, cancel).await;

        finished.cancel();
        let interrupted = match watch.await {
            Ok(interrupted) => interrupted,
            Err(e) => {
                error!(target: "runsim.run", error = %e, "cancellation watcher failed");
                None
            }
        };

        let mut outcomes = Vec::with_capacity(seeds.len());
        while let Some(outcome) = rx.recv().await {
            outcomes.push(outcome);
        }

        let state = if interrupted.is_some() {
            PoolState::Cancelled
        } else {
            report.state
        };
        let mut summary = RunSummary {
            state,
            workers: report.workers,
            outcomes,
            interrupted,
            report_error: None,
        };
        let failed = summary.failed_seeds();
        info!(
            target: "runsim.run",
            ?state,
            passed = summary.outcomes.len() - failed.len(),
            failed = failed.len(),
            "run finished"
        );
        if !failed.is_empty() {
            warn!(target: "runsim.run", seeds = ?failed, "failed seeds");
        }

        if let Some(reporter) = &self.reporter {
            let reporting = async {
                match &summary.interrupted {
                    Some(interrupted) => {
                        reporter.report_interrupt(interrupted).await;
                        None
                    }
                    None => reporter
                        .report_results(&summary.outcomes, summary.any_failed())
                        .await
                        .err()
                        .map(|e| e.to_string()),
                }
            };
            let reported = until_shutdown(reporting, shutdown()).await;
            summary.report_error = match reported {
                Some(report_error) => report_error,
                None => Some(REPORT_INTERRUPTED.to_string()),
            };
        }
        summary
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::{
        path::Path,
        pin::Pin,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use async_trait::async_trait;
    use runsim_exec::CommandSpec;
    use runsim_model::SeedTask;

    use super::*;
    use crate::{
        aggregate::{BlobStore, LocalBlobStore, ObjectKey},
        fleet::FleetTracker,
        notify::{
            Conclusion, NotificationSink,
            testing::{Call, RecordingSink},
        },
        pool::FailureMode,
    };

    struct Script {
        script: &'static str,
        built: AtomicUsize,
    }

    impl Script {
        fn new(script: &'static str) -> Arc<Self> {
            Arc::new(Self {
                script,
                built: AtomicUsize::new(0),
            })
        }
    }

    impl CommandBuilder for Script {
        fn build(&self, task: &SeedTask) -> CommandSpec {
            self.built.fetch_add(1, Ordering::SeqCst);
            CommandSpec::new("sh")
                .arg("-c")
                .arg(format!("SEED={}; {}", task.seed, self.script))
        }
    }

    /// Rejects every upload.
    struct UnavailableStore;

    #[async_trait]
    impl BlobStore for UnavailableStore {
        async fn put(&self, key: &ObjectKey, _file: &Path) -> Result<String, CoreError> {
            Err(CoreError::Upload {
                key: key.to_string(),
                reason: "503".into(),
            })
        }
    }

    /// Never finishes an upload.
    struct StuckStore;

    #[async_trait]
    impl BlobStore for StuckStore {
        async fn put(&self, _key: &ObjectKey, _file: &Path) -> Result<String, CoreError> {
            std::future::pending().await
        }
    }

    /// Shutdown listeners where only the first or only the second fires.
    ///
    /// `Some(delay)` interrupts the run after `delay`; `None` leaves the run
    /// alone and interrupts the reporting phase at once.
    fn interrupt_once(
        run_delay: Option<Duration>,
    ) -> impl Fn() -> Pin<Box<dyn Future<Output = io::Result<()>> + Send>> {
        let calls = Arc::new(AtomicUsize::new(0));
        move || {
            let first = calls.fetch_add(1, Ordering::SeqCst) == 0;
            Box::pin(async move {
                match (first, run_delay) {
                    (true, Some(delay)) => tokio::time::sleep(delay).await,
                    (false, None) => {}
                    _ => std::future::pending::<()>().await,
                }
                Ok(())
            })
        }
    }

    struct Harness {
        dir: tempfile::TempDir,
        sink: Arc<RecordingSink>,
        store: LocalBlobStore,
    }

    impl Harness {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = LocalBlobStore::new(dir.path().join("bucket"));
            Self {
                dir,
                sink: Arc::new(RecordingSink::default()),
                store,
            }
        }

        fn orchestrator(&self, jobs: usize, mode: FailureMode, builder: Arc<Script>) -> Orchestrator {
            self.orchestrator_with_store(jobs, mode, builder, Arc::new(self.store.clone()))
        }

        fn orchestrator_with_store(
            &self,
            jobs: usize,
            mode: FailureMode,
            builder: Arc<Script>,
            store: Arc<dyn BlobStore>,
        ) -> Orchestrator {
            let run_dir = self.dir.path().join("run");
            std::fs::create_dir_all(&run_dir).unwrap();
            let run_log = run_dir.join("runsim_log");
            std::fs::write(&run_log, "log").unwrap();

            let cfg = RunConfig {
                pool: PoolConfig {
                    jobs,
                    mode,
                    heartbeat: Duration::from_secs(60),
                },
                layout: RunLayout::with_stamp(&run_dir, "t"),
                host_id: "host-a".into(),
            };
            let reporter = Reporter::new(
                ResultAggregator::new(&run_dir, store, "ci", "host-a"),
                Publisher::new(
                    vec![self.sink.clone() as Arc<dyn NotificationSink>],
                    FleetTracker::single_machine(),
                ),
            )
            .with_run_log(run_log);
            Orchestrator::new(cfg, builder).with_reporter(reporter)
        }

        fn uploaded(&self, name: &str) -> bool {
            self.dir.path().join("bucket/ci/host-a").join(name).exists()
        }
    }

    #[tokio::test]
    async fn completed_run_uploads_and_concludes_success() {
        let h = Harness::new();
        let orch = h.orchestrator(2, FailureMode::Batch, Script::new("echo ok"));

        let summary = orch.run(&[1, 2, 3], std::future::pending).await;
        assert_eq!(summary.state, PoolState::Completed);
        assert_eq!(summary.outcomes.len(), 3);
        assert_eq!(summary.exit_code(), 0);

        assert!(h.uploaded("ok.zip"));
        assert!(!h.uploaded("failed.zip"));
        assert!(h.uploaded("runsim_log"));
        assert_eq!(
            h.sink.calls(),
            vec![
                Call::Final("Host host-a finished simulation. Logs: ".into(), Conclusion::Success),
                Call::DeleteState,
            ]
        );
    }

    #[tokio::test]
    async fn aborted_run_still_reports_failure() {
        let h = Harness::new();
        let orch = h.orchestrator(1, FailureMode::FailFast, Script::new("exit 2"));

        let summary = orch.run(&[1, 2, 3], std::future::pending).await;
        assert_eq!(summary.state, PoolState::Aborted);
        assert_eq!(summary.failed_seeds(), vec![1]);
        assert_eq!(summary.exit_code(), 1);

        assert!(h.uploaded("failed.zip"));
        assert!(matches!(
            h.sink.calls().first(),
            Some(Call::Final(_, Conclusion::Failure))
        ));
    }

    #[tokio::test]
    async fn invalid_override_starts_nothing() {
        let h = Harness::new();
        let builder = Script::new("true");
        let orch = h.orchestrator(4, FailureMode::Batch, builder.clone());

        let res = orch
            .run_with_override(Some("3,x,5"), std::future::pending)
            .await;
        assert!(res.is_err());
        assert_eq!(builder.built.load(Ordering::SeqCst), 0);
        assert!(orch.registry().is_empty());

        match h.sink.calls().first() {
            Some(Call::Final(headline, Conclusion::Failure)) => {
                assert!(headline.starts_with("Host host-a: ERROR: build seed list:"));
            }
            other => panic!("unexpected call: {other:?}"),
        }
        assert!(h.uploaded("runsim_log"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn interrupt_stops_new_seeds_and_kills_running_ones() {
        let h = Harness::new();
        let builder = Script::new("sleep 30");
        let orch = h.orchestrator(2, FailureMode::Batch, builder.clone());

        let started = std::time::Instant::now();
        let summary = orch
            .run(&[1, 2, 3, 4, 5, 6], interrupt_once(Some(Duration::from_millis(300))))
            .await;

        assert!(started.elapsed() < Duration::from_secs(20));
        assert_eq!(summary.state, PoolState::Cancelled);
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(builder.built.load(Ordering::SeqCst), 2);
        assert_eq!(summary.outcomes.len(), 2);
        assert!(summary.outcomes.iter().all(|o| o.failed));

        let interrupted = summary.interrupted.as_ref().unwrap();
        assert_eq!(interrupted.discarded, vec![3, 4, 5, 6]);
        assert!(orch.registry().is_empty());

        assert!(h.uploaded("runsim_log"));
        assert!(matches!(
            h.sink.calls().first(),
            Some(Call::Final(_, Conclusion::Failure))
        ));
    }

    #[tokio::test]
    async fn upload_failure_is_reported_as_failure() {
        let h = Harness::new();
        let orch = h.orchestrator_with_store(
            2,
            FailureMode::Batch,
            Script::new("echo ok"),
            Arc::new(UnavailableStore),
        );

        let summary = orch.run(&[1, 2], std::future::pending).await;
        assert_eq!(summary.state, PoolState::Completed);
        assert!(!summary.any_failed());
        assert!(summary.report_error.is_some());
        assert_eq!(summary.exit_code(), 1);

        assert_eq!(
            h.sink.calls(),
            vec![
                Call::Final(
                    "Host host-a: ERROR: publish artifacts: upload ci/host-a/ok.zip: 503".into(),
                    Conclusion::Failure
                ),
                Call::DeleteState,
            ]
        );
    }

    #[tokio::test]
    async fn interrupt_while_reporting_abandons_report() {
        let h = Harness::new();
        let orch = h.orchestrator_with_store(
            1,
            FailureMode::Batch,
            Script::new("true"),
            Arc::new(StuckStore),
        );

        let summary = tokio::time::timeout(
            Duration::from_secs(10),
            orch.run(&[1], interrupt_once(None)),
        )
        .await
        .expect("reporting was not interrupted");

        assert_eq!(summary.state, PoolState::Completed);
        assert!(summary.interrupted.is_none());
        assert_eq!(summary.report_error.as_deref(), Some(REPORT_INTERRUPTED));
        assert_eq!(summary.exit_code(), 1);
        assert!(h.sink.calls().is_empty());
    }
}
