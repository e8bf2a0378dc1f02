mod seed;
pub use seed::{DEFAULT_SEEDS, parse_seed_list, resolve_seeds};

mod task;
pub use task::{RunLayout, SeedTask};

mod outcome;
pub use outcome::RunOutcome;

mod state;
pub use state::IntegrationState;

/// Deterministic input selecting one simulation trajectory.
pub type Seed = i64;
