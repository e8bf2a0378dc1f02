mod error;
pub use error::{ExecError, ExecResult};

mod command;
pub use command::{CommandBuilder, CommandSpec, GoTestCommand};

mod registry;
pub use registry::{ProcessEntry, ProcessRegistry, TerminateReport};

pub mod supervisor;
pub use supervisor::{ExitReport, ProcessSupervisor, StderrMode, SupervisedChild};

mod util;
pub use util::{Signal, kill_graceful, send_signal};

pub mod prelude {
    pub use crate::error::{ExecError, ExecResult};
    pub use crate::{CommandBuilder, CommandSpec, ProcessRegistry, ProcessSupervisor, StderrMode};
}
