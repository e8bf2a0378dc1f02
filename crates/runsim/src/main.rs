mod cli;
mod setup;

use std::{process::ExitCode, sync::Arc};

use anyhow::Context;
use clap::Parser;
use runsim_core::{Orchestrator, RunConfig, system, wait_for_shutdown_signal};
use runsim_exec::GoTestCommand;
use runsim_model::RunLayout;
use runsim_observe::{logger_init, run_log_path};
use tracing::{error, info};

use crate::cli::Cli;

const RUN_DIR_PREFIX: &str = "sim-logs-";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(target: "runsim.run", error = %format!("{e:#}"), "runsim failed");
            eprintln!("runsim: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    // The run directory outlives the process.
    let run_dir = tempfile::Builder::new()
        .prefix(RUN_DIR_PREFIX)
        .tempdir()
        .context("create run directory")?
        .keep();
    let run_log = run_log_path(&run_dir);
    logger_init(&cli.logger_config(&run_dir)).context("init logger")?;

    let host_id = cli.host_id.clone().unwrap_or_else(system::host_id);
    info!(
        target: "runsim.run",
        host = %host_id,
        sim_id = cli.sim_id.as_deref().unwrap_or("-"),
        dir = %run_dir.display(),
        jobs = cli.jobs,
        "runsim starting"
    );

    let reporter = setup::reporter(&cli, &run_dir, &run_log, &host_id).await?;

    let cfg = RunConfig {
        pool: cli.pool_config(),
        layout: RunLayout::new(&run_dir).context("prepare run layout")?,
        host_id,
    };
    let builder = Arc::new(GoTestCommand::new(cli.sim_params()));
    let mut orchestrator = Orchestrator::new(cfg, builder);
    if let Some(reporter) = reporter {
        orchestrator = orchestrator.with_reporter(reporter);
    }

    let summary = orchestrator
        .run_with_override(cli.seeds.as_deref(), wait_for_shutdown_signal)
        .await
        .context("build seed list")?;

    let code = summary.exit_code();
    info!(
        target: "runsim.run",
        state = ?summary.state,
        failed = ?summary.failed_seeds(),
        code,
        "runsim done"
    );
    Ok(code)
}
