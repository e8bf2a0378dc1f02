use std::fmt;

use runsim_model::{SeedTask, SimParams, format_go_duration};
use tokio::process::Command;

/// Program plus argument vector for one subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub(crate) fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args.iter().map(|s| s.as_str()));
        cmd
    }
}

/// Space-joined command line, suitable for "to reproduce run:" hints.
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Turns a seed task into the command that runs it.
///
/// Building must be deterministic: the same task always yields the same
/// command, so a logged command line reproduces the run.
pub trait CommandBuilder: Send + Sync {
    fn build(&self, task: &SeedTask) -> CommandSpec;
}

/// `go test` invocation of the simulation.
#[derive(Debug, Clone)]
pub struct GoTestCommand {
    params: SimParams,
}

impl GoTestCommand {
    pub fn new(params: SimParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }
}

impl CommandBuilder for GoTestCommand {
    fn build(&self, task: &SeedTask) -> CommandSpec {
        let p = &self.params;
        let genesis = p
            .genesis
            .as_ref()
            .map(|g| g.display().to_string())
            .unwrap_or_default();

        CommandSpec::new(&p.program)
            .arg("test")
            .arg(&p.package)
            .arg("-run")
            .arg(&p.test_name)
            .arg("-Enabled=true")
            .arg(format!("-NumBlocks={}", p.blocks))
            .arg(format!("-Genesis={genesis}"))
            .arg(format!("-Verbose={}", p.verbose))
            .arg(format!("-Commit={}", p.commit))
            .arg(format!("-Seed={}", task.seed))
            .arg(format!("-Period={}", p.period))
            .arg("-ExportParamsPath")
            .arg(task.export_params.display().to_string())
            .arg("-ExportStatePath")
            .arg(task.export_state.display().to_string())
            .arg("-v")
            .arg("-timeout")
            .arg(format_go_duration(p.timeout))
    }
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use runsim_model::RunLayout;

    use super::*;

    fn params() -> SimParams {
        let mut p = SimParams::new("TestFullAppSimulation", 400, 5);
        p.package = "./simapp".into();
        p.timeout = Duration::from_secs(3600);
        p
    }

    #[test]
    fn go_test_command_line() {
        let layout = RunLayout::with_stamp("/tmp/run", "stamp");
        let task = layout.task(7);
        let cmd = GoTestCommand::new(params()).build(&task);

        assert_eq!(cmd.program, "go");
        assert_eq!(
            cmd.to_string(),
            "go test ./simapp -run TestFullAppSimulation -Enabled=true -NumBlocks=400 \
             -Genesis= -Verbose=true -Commit=true -Seed=7 -Period=5 \
             -ExportParamsPath /tmp/run/sim_params-7.json \
             -ExportStatePath /tmp/run/sim_state-7.json -v -timeout 1h0m0s"
        );
    }

    #[test]
    fn genesis_path_is_passed_through() {
        let mut p = params();
        p.genesis = Some(PathBuf::from("/data/genesis.json"));
        let task = RunLayout::with_stamp("/tmp/run", "stamp").task(1);
        let cmd = GoTestCommand::new(p).build(&task);
        assert!(cmd.args.contains(&"-Genesis=/data/genesis.json".to_string()));
    }

    #[test]
    fn build_is_deterministic() {
        let builder = GoTestCommand::new(params());
        let task = RunLayout::with_stamp("/tmp/run", "stamp").task(99);
        assert_eq!(builder.build(&task), builder.build(&task));
    }
}
