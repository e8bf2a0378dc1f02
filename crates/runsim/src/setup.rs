//! Wiring of the reporting pipeline from the command line.

use std::{path::Path, sync::Arc};

use anyhow::{Context, bail};
use runsim_aws::{
    DynamoStateStore, S3BlobStore, SdkConfig, SqsTokenSource, SsmSecrets, load_sdk_config,
};
use runsim_core::{
    BlobStore, FleetTracker, LocalBlobStore, NotificationSink, Publisher, Reporter,
    ResultAggregator,
};
use runsim_notify::{GitHubSink, SinkError, SlackSink, StateStore, github, slack};
use tracing::{error, info, warn};

use crate::cli::Cli;

/// Build the reporter for this run, or `None` when nothing is uploaded.
///
/// If a requested sink cannot be set up the run log is uploaded before the
/// error is returned.
pub async fn reporter(
    cli: &Cli,
    run_dir: &Path,
    run_log: &Path,
    host_id: &str,
) -> anyhow::Result<Option<Reporter>> {
    if !cli.reports() {
        info!(target: "runsim.run", "no sink or store configured, results stay local");
        return Ok(None);
    }

    let sdk = if cli.local_store.is_none() || cli.notifies() {
        Some(load_sdk_config(&cli.aws_settings()).await)
    } else {
        None
    };

    let store: Arc<dyn BlobStore> = match (&cli.local_store, &sdk) {
        (Some(dir), _) => Arc::new(LocalBlobStore::new(dir)),
        (None, Some(sdk)) => Arc::new(
            S3BlobStore::discover(sdk, &cli.bucket_prefix)
                .await
                .context("find upload bucket")?,
        ),
        (None, None) => bail!("no upload target configured"),
    };
    let aggregator = ResultAggregator::new(run_dir, store, &cli.log_obj_prefix, host_id);

    let sinks = match &sdk {
        Some(sdk) if cli.notifies() => match sinks(cli, sdk).await {
            Ok(sinks) => sinks,
            Err(e) => {
                error!(target: "runsim.run", error = %e, "notification setup failed");
                if let Err(up) = aggregator.upload_file(run_log).await {
                    warn!(target: "runsim.run", error = %up, "run log upload failed");
                }
                return Err(e).context("set up notification sinks");
            }
        },
        _ => Vec::new(),
    };

    let tracker = match &sdk {
        Some(sdk) if !cli.single_machine && cli.local_store.is_none() => {
            FleetTracker::new(Arc::new(SqsTokenSource::new(sdk, &cli.queue_prefix)))
        }
        _ => FleetTracker::single_machine(),
    };

    let publisher = Publisher::new(sinks, tracker);
    Ok(Some(Reporter::new(aggregator, publisher).with_run_log(run_log)))
}

async fn sinks(
    cli: &Cli,
    sdk: &SdkConfig,
) -> Result<Vec<Arc<dyn NotificationSink>>, SinkError> {
    let state: Arc<dyn StateStore> = Arc::new(DynamoStateStore::new(sdk, &cli.state_table));
    let secrets = SsmSecrets::new(sdk);

    let mut sinks: Vec<Arc<dyn NotificationSink>> = Vec::new();
    if cli.slack {
        let sink = SlackSink::from_state(
            state.clone(),
            &secrets,
            &cli.slack_token_param,
            slack::DEFAULT_API_BASE,
        )
        .await?;
        sinks.push(Arc::new(sink));
    }
    if cli.github {
        let sink = GitHubSink::from_state(
            state,
            &secrets,
            &cli.github_token_param,
            github::DEFAULT_API_BASE,
        )
        .await?;
        sinks.push(Arc::new(sink));
    }
    info!(target: "runsim.run", sinks = sinks.len(), "notification sinks ready");
    Ok(sinks)
}
