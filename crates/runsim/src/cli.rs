use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use runsim_aws::{AwsSettings, DEFAULT_BUCKET_PREFIX, DEFAULT_QUEUE_PREFIX, DEFAULT_REGION, DEFAULT_STATE_TABLE};
use runsim_core::{FailureMode, PoolConfig};
use runsim_model::{SimParams, parse_duration};
use runsim_notify::{github, slack};
use runsim_observe::{LoggerConfig, LoggerFormat};

/// Run a Go simulation test once per seed, in parallel, and report the
/// results.
#[derive(Parser, Debug)]
#[command(name = "runsim", version)]
pub struct Cli {
    /// Number of blocks to simulate.
    pub blocks: u64,

    /// Invariant checkpoint period.
    pub period: u64,

    /// Simulation test to run (`go test -run <TESTNAME>`).
    pub testname: String,

    /// Genesis file passed to the test instead of a random genesis.
    #[arg(long)]
    pub genesis: Option<PathBuf>,

    /// Package holding the simulation test.
    #[arg(long, default_value = SimParams::DEFAULT_PACKAGE)]
    pub sim_app_pkg: String,

    /// Identifier of the logical run this machine belongs to.
    #[arg(long)]
    pub sim_id: Option<String>,

    /// Name of this machine in notices and object keys. Defaults to the hostname.
    #[arg(long)]
    pub host_id: Option<String>,

    /// Comma-separated seeds replacing the built-in list.
    #[arg(long)]
    pub seeds: Option<String>,

    /// Object key prefix for uploaded archives.
    #[arg(long, default_value = "")]
    pub log_obj_prefix: String,

    /// Report results into the Slack thread stored in the state table.
    #[arg(long)]
    pub slack: bool,

    /// Report results on the GitHub check run stored in the state table.
    #[arg(long)]
    pub github: bool,

    /// Abort all seeds on the first failure.
    #[arg(long)]
    pub exit_on_fail: bool,

    /// Seeds run concurrently.
    #[arg(long, default_value_t = default_jobs())]
    pub jobs: usize,

    /// Bound on one test invocation (`24h`, `90m`, `3600`).
    #[arg(long, default_value = "24h", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Seconds between progress lines while seeds run.
    #[arg(long, default_value_t = 60)]
    pub heartbeat_secs: u64,

    /// Upload archives into this directory instead of S3. Disables the fleet check.
    #[arg(long)]
    pub local_store: Option<PathBuf>,

    /// Treat this machine as the whole fleet, skipping the token queue.
    #[arg(long)]
    pub single_machine: bool,

    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// Upload bucket: the first whose name contains this.
    #[arg(long, default_value = DEFAULT_BUCKET_PREFIX)]
    pub bucket_prefix: String,

    /// Fleet queue: the first whose name starts with this.
    #[arg(long, default_value = DEFAULT_QUEUE_PREFIX)]
    pub queue_prefix: String,

    #[arg(long, default_value = DEFAULT_STATE_TABLE)]
    pub state_table: String,

    #[arg(long, default_value = slack::DEFAULT_TOKEN_NAME)]
    pub slack_token_param: String,

    #[arg(long, default_value = github::DEFAULT_TOKEN_NAME)]
    pub github_token_param: String,

    /// Log format: text, json or journald.
    #[arg(long, default_value = "text", value_parser = LoggerFormat::from_str)]
    pub log_format: LoggerFormat,

    /// Log filter directives, e.g. `info,runsim.pool=debug`.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

impl Cli {
    /// Whether any notification sink was requested.
    pub fn notifies(&self) -> bool {
        self.slack || self.github
    }

    /// Results are uploaded when someone will read them.
    pub fn reports(&self) -> bool {
        self.notifies() || self.local_store.is_some()
    }

    pub fn sim_params(&self) -> SimParams {
        let mut params = SimParams::new(&self.testname, self.blocks, self.period);
        params.package = self.sim_app_pkg.clone();
        params.genesis = self.genesis.clone();
        params.timeout = self.timeout;
        params
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            jobs: self.jobs,
            mode: if self.exit_on_fail {
                FailureMode::FailFast
            } else {
                FailureMode::Batch
            },
            heartbeat: Duration::from_secs(self.heartbeat_secs),
        }
    }

    pub fn logger_config(&self, run_dir: &Path) -> LoggerConfig {
        LoggerConfig {
            format: self.log_format,
            level: self.log_level.clone(),
            ..LoggerConfig::default()
        }
        .in_run_dir(run_dir)
    }

    pub fn aws_settings(&self) -> AwsSettings {
        AwsSettings {
            region: self.region.clone(),
            bucket_prefix: self.bucket_prefix.clone(),
            queue_prefix: self.queue_prefix.clone(),
            state_table: self.state_table.clone(),
        }
    }
}
