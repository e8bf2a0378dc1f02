//! Plain data types shared by every runsim crate.
//!
//! Nothing here spawns processes or talks to the network: the model only
//! describes seeds, the per-seed work item and its outcome, run-wide test
//! parameters and the opaque integration record used by notification sinks.

mod error;
pub use error::ModelError;

pub mod domain;
pub use domain::*;

mod params;
pub use params::{SimParams, format_go_duration, parse_duration};
