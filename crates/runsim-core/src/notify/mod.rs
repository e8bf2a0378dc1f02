//! Result notices and their dispatch to the configured sinks.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use tracing::{error, info};

use crate::{
    aggregate::ArtifactLink,
    error::CoreError,
    fleet::{FleetStatus, FleetTracker},
};

/// How a final notification concludes the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conclusion {
    Success,
    Failure,
    /// Completion status could not be determined.
    Neutral,
}

impl Conclusion {
    pub fn from_failed(failed: bool) -> Self {
        if failed {
            Conclusion::Failure
        } else {
            Conclusion::Success
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Conclusion::Success => "success",
            Conclusion::Failure => "failure",
            Conclusion::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Conclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message about this host's run. Sinks render `links` in their own markup
/// after `headline`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub host_id: String,
    pub headline: String,
    pub links: Vec<ArtifactLink>,
}

impl Notice {
    pub fn finished(host_id: &str, links: Vec<ArtifactLink>) -> Self {
        Self {
            host_id: host_id.to_string(),
            headline: format!("Host {host_id} finished simulation. Logs: "),
            links,
        }
    }

    pub fn error(host_id: &str, what: &str, err: impl fmt::Display) -> Self {
        Self {
            host_id: host_id.to_string(),
            headline: format!("Host {host_id}: ERROR: {what}: {err}"),
            links: Vec::new(),
        }
    }
}

/// An integration that receives run notices.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Intermediate update while other machines are still running.
    async fn post_progress(&self, notice: &Notice) -> Result<(), CoreError>;

    async fn post_final(&self, notice: &Notice, conclusion: Conclusion) -> Result<(), CoreError>;

    /// A failure on a machine that is not the last one running. Sinks that
    /// close a shared thread on final posts should override this.
    async fn post_failure(&self, notice: &Notice) -> Result<(), CoreError> {
        self.post_final(notice, Conclusion::Failure).await
    }

    /// Remove the integration state once the whole fleet is done.
    async fn delete_state(&self) -> Result<(), CoreError>;
}

/// What a sink receives for a given fleet verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Progress,
    /// Failed while other machines are still running.
    EarlyFailure,
    Final {
        conclusion: Conclusion,
        delete_state: bool,
    },
}

pub fn delivery_for(status: &FleetStatus, failed: bool) -> Delivery {
    match status {
        FleetStatus::Unknown(_) => Delivery::Final {
            conclusion: Conclusion::Neutral,
            delete_state: false,
        },
        FleetStatus::Last => Delivery::Final {
            conclusion: Conclusion::from_failed(failed),
            delete_state: true,
        },
        FleetStatus::Pending if failed => Delivery::EarlyFailure,
        FleetStatus::Pending => Delivery::Progress,
    }
}

/// Sends notices to every sink after one fleet check.
pub struct Publisher {
    sinks: Vec<Arc<dyn NotificationSink>>,
    tracker: FleetTracker,
}

impl Publisher {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>, tracker: FleetTracker) -> Self {
        Self { sinks, tracker }
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Returns the fleet verdict the notice was dispatched under.
    pub async fn publish(&self, notice: &Notice, failed: bool) -> FleetStatus {
        let status = self.tracker.check().await;
        let delivery = delivery_for(&status, failed);
        info!(target: "runsim.notify", ?status, ?delivery, headline = %notice.headline, "publishing notice");

        for sink in &self.sinks {
            if let Err(e) = deliver(sink.as_ref(), notice, delivery).await {
                error!(target: "runsim.notify", sink = sink.name(), error = %e, "notification failed");
            }
        }
        status
    }
}

async fn deliver(
    sink: &dyn NotificationSink,
    notice: &Notice,
    delivery: Delivery,
) -> Result<(), CoreError> {
    match delivery {
        Delivery::Progress => sink.post_progress(notice).await,
        Delivery::EarlyFailure => sink.post_failure(notice).await,
        Delivery::Final {
            conclusion,
            delete_state,
        } => {
            // The state goes even when the post fails; the first error wins.
            let posted = sink.post_final(notice, conclusion).await;
            if delete_state && let Err(e) = sink.delete_state().await {
                if posted.is_ok() {
                    return Err(e);
                }
                error!(target: "runsim.notify", sink = sink.name(), error = %e, "state delete failed");
            }
            posted
        }
    }
}
