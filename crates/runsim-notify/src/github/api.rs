use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(super) struct PullRequest {
    pub head: Head,
}

#[derive(Debug, Deserialize)]
pub(super) struct Head {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct CheckRunList {
    pub check_runs: Vec<CheckRun>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct CheckRun {
    pub id: u64,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub output: Option<Output>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(super) struct Output {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct UpdateCheckRun<'a> {
    pub name: &'a str,
    pub status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    pub output: Output,
}
