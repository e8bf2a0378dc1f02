//! Detects whether this machine is the last of a fleet to finish.
//!
//! Every machine of a fleet of `f` shares a queue pre-loaded with `f - 1`
//! tokens. Finishing machines each try to consume one token: the one that
//! finds the queue empty is the last. Receive and delete are separate calls,
//! so a machine that crashes between them leaves the count one short; that
//! gap is accepted.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::CoreError;

/// A queue of completion tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Try once to take a token. `Ok(false)` when none was available.
    async fn try_consume(&self) -> Result<bool, CoreError>;
}

/// Token source backed by an in-process counter.
#[derive(Debug, Default)]
pub struct MemoryTokenSource {
    remaining: AtomicUsize,
}

impl MemoryTokenSource {
    pub fn new(tokens: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(tokens),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSource for MemoryTokenSource {
    async fn try_consume(&self) -> Result<bool, CoreError> {
        Ok(self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok())
    }
}

/// Verdict of a fleet check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetStatus {
    /// Other machines are still running.
    Pending,
    /// This machine finished last.
    Last,
    /// The queue could not be checked.
    Unknown(String),
}

#[derive(Clone)]
pub struct FleetTracker {
    source: Option<Arc<dyn TokenSource>>,
}

impl FleetTracker {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self {
            source: Some(source),
        }
    }

    /// A fleet of one: always last.
    pub fn single_machine() -> Self {
        Self { source: None }
    }

    /// Consume at most one token and report where this machine stands.
    pub async fn check(&self) -> FleetStatus {
        let Some(source) = &self.source else {
            return FleetStatus::Last;
        };
        match source.try_consume().await {
            Ok(true) => {
                info!(target: "runsim.fleet", "completion token consumed; other machines still running");
                FleetStatus::Pending
            }
            Ok(false) => {
                info!(target: "runsim.fleet", "no completion tokens left; this machine is last");
                FleetStatus::Last
            }
            Err(e) => {
                error!(target: "runsim.fleet", error = %e, "fleet completion check failed");
                FleetStatus::Unknown(e.to_string())
            }
        }
    }
}
