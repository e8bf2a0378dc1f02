pub mod error;
pub use error::CoreError;

pub mod queue;
pub use queue::SeedQueue;

pub mod pool;
pub use pool::{FailureMode, PoolConfig, PoolReport, PoolState, WorkerPool, effective_workers};

pub mod cancel;
pub use cancel::{CancellationWatcher, Interrupted, wait_for_shutdown_signal};

pub mod aggregate;
pub use aggregate::{
    Archive, ArchiveKind, ArtifactLink, ArtifactSet, BlobStore, LocalBlobStore, ObjectKey,
    ResultAggregator, aggregate, bundle,
};

pub mod fleet;
pub use fleet::{FleetStatus, FleetTracker, MemoryTokenSource, TokenSource};

pub mod notify;
pub use notify::{Conclusion, Delivery, Notice, NotificationSink, Publisher, delivery_for};

pub mod orchestrator;
pub use orchestrator::{Orchestrator, Reporter, RunConfig, RunSummary};

pub mod system;
