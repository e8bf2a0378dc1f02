use std::{path::PathBuf, time::Duration};

use crate::ModelError;

/// Run-wide parameters shared by every seed's test invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimParams {
    /// Toolchain binary used to launch the test (`go`).
    pub program: String,
    /// Package holding the simulation test.
    pub package: String,
    /// Test function selected with `-run`.
    pub test_name: String,
    /// Number of blocks to simulate.
    pub blocks: u64,
    /// Invariant checkpoint period.
    pub period: u64,
    /// Genesis file; `None` lets the test generate a random genesis.
    pub genesis: Option<PathBuf>,
    pub verbose: bool,
    pub commit: bool,
    /// Bound on a single test invocation, passed through to the test binary.
    pub timeout: Duration,
}

impl SimParams {
    pub const DEFAULT_PACKAGE: &'static str = "github.com/cosmos/cosmos-sdk/simapp";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

    pub fn new(test_name: impl Into<String>, blocks: u64, period: u64) -> Self {
        Self {
            program: "go".to_string(),
            package: Self::DEFAULT_PACKAGE.to_string(),
            test_name: test_name.into(),
            blocks,
            period,
            genesis: None,
            verbose: true,
            commit: true,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

/// Render a duration the way Go's `time.Duration.String` does for whole
/// seconds (`24h0m0s`, `1m30s`, `45s`).
pub fn format_go_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m}m{s}s")
    } else if m > 0 {
        format!("{m}m{s}s")
    } else {
        format!("{s}s")
    }
}

/// Parse `24h`, `1h30m`, `90s` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration, ModelError> {
    let raw = raw.trim();
    let invalid = || ModelError::InvalidDuration(raw.to_string());
    if raw.is_empty() {
        return Err(invalid());
    }
    if let Ok(secs) = raw.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for c in raw.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let n: u64 = digits.parse().map_err(|_| invalid())?;
        digits.clear();
        let unit = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };
        total = n
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(invalid)?;
    }
    if !digits.is_empty() {
        return Err(invalid());
    }
    Ok(Duration::from_secs(total))
}
