//! Reports run results on a pull request's check run.
//!
//! The check run is created elsewhere when the simulation is requested; this
//! sink only finds the active one (latest run with the configured name and no
//! conclusion yet) and updates its output and status.

mod api;
use api::{CheckRun, CheckRunList, Output, PullRequest, UpdateCheckRun};

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use runsim_core::{Conclusion, CoreError, Notice, NotificationSink};
use runsim_model::IntegrationState;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, info};

use crate::{
    error::SinkError,
    markup::Markup,
    state::{SecretStore, StateStore},
};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_TOKEN_NAME: &str = "github-sim-app-key";

const KIND: &str = "GitHub";
const USER_AGENT: &str = "runsim";
const OUTPUT_TITLE: &str = "Details";

/// Pull request and check run a run reports to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitHubTarget {
    pub owner: String,
    pub repo: String,
    pub check_run_name: String,
    pub pr_num: u64,
}

impl GitHubTarget {
    pub fn from_state(row: &IntegrationState) -> Result<Self, SinkError> {
        let pr = row.require("PrNum")?;
        let pr_num = pr.parse().map_err(|_| SinkError::InvalidAttribute {
            key: "PrNum".to_string(),
            value: pr.to_string(),
        })?;
        Ok(Self {
            owner: row.require("RepoOwner")?.to_string(),
            repo: row.require("RepoName")?.to_string(),
            check_run_name: row.require("CheckRunName")?.to_string(),
            pr_num,
        })
    }
}

pub struct GitHubSink {
    http: Client,
    api_base: String,
    token: String,
    target: GitHubTarget,
    head_sha: String,
    check_run: CheckRun,
    state: Arc<dyn StateStore>,
}

impl GitHubSink {
    /// Build the sink from the `GitHub` state row and the token named
    /// `token_name`, then resolve the active check run.
    pub async fn from_state(
        state: Arc<dyn StateStore>,
        secrets: &dyn SecretStore,
        token_name: &str,
        api_base: &str,
    ) -> Result<Self, SinkError> {
        let row = state
            .load(KIND)
            .await?
            .ok_or_else(|| SinkError::MissingState(KIND.to_string()))?;
        let target = GitHubTarget::from_state(&row)?;
        let token = secrets.secret(token_name).await?;
        Self::connect(target, token, state, api_base).await
    }

    pub async fn connect(
        target: GitHubTarget,
        token: String,
        state: Arc<dyn StateStore>,
        api_base: &str,
    ) -> Result<Self, SinkError> {
        let mut sink = Self {
            http: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            target,
            head_sha: String::new(),
            check_run: CheckRun::default(),
            state,
        };

        let pr: PullRequest = sink
            .request(sink.http.get(sink.repo_url(&format!("pulls/{}", sink.target.pr_num))))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        sink.head_sha = pr.head.sha;

        sink.check_run = sink.active_check_run().await?;
        info!(
            target: "runsim.github",
            repo = %format!("{}/{}", sink.target.owner, sink.target.repo),
            pr = sink.target.pr_num,
            check_run = sink.check_run.id,
            "active check run found"
        );
        Ok(sink)
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.target.owner, self.target.repo, path
        )
    }

    fn request(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .header(reqwest::header::USER_AGENT, USER_AGENT)
    }

    async fn active_check_run(&self) -> Result<CheckRun, SinkError> {
        let url = Url::parse_with_params(
            &self.repo_url(&format!("commits/{}/check-runs", self.head_sha)),
            &[
                ("check_name", self.target.check_run_name.as_str()),
                ("filter", "latest"),
            ],
        )
        .map_err(|e| SinkError::Api {
            method: "list check runs".to_string(),
            error: e.to_string(),
        })?;

        let list: CheckRunList = self
            .request(self.http.get(url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match list.check_runs.into_iter().next() {
            Some(run) if run.conclusion.is_none() => Ok(run),
            _ => Err(SinkError::NoActiveCheckRun(self.target.check_run_name.clone())),
        }
    }

    /// Summary currently shown on the check run.
    async fn current_summary(&self) -> Result<String, SinkError> {
        let run: CheckRun = self
            .request(
                self.http
                    .get(self.repo_url(&format!("check-runs/{}", self.check_run.id))),
            )
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(run.output.and_then(|o| o.summary).unwrap_or_default())
    }

    async fn update(
        &self,
        notice: &Notice,
        status: &str,
        conclusion: Option<Conclusion>,
    ) -> Result<(), SinkError> {
        let mut summary = self.current_summary().await?;
        summary.push_str(&Markup::GitHub.render(notice));

        let body = UpdateCheckRun {
            name: &self.check_run.name,
            status,
            conclusion: conclusion.map(Conclusion::as_str),
            completed_at: conclusion.and_then(|_| OffsetDateTime::now_utc().format(&Rfc3339).ok()),
            output: Output {
                title: Some(OUTPUT_TITLE.to_string()),
                summary: Some(summary),
            },
        };
        self.request(
            self.http
                .patch(self.repo_url(&format!("check-runs/{}", self.check_run.id))),
        )
        .json(&body)
        .send()
        .await?
        .error_for_status()?;

        debug!(target: "runsim.github", check_run = self.check_run.id, status, ?conclusion, "check run updated");
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for GitHubSink {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn post_progress(&self, notice: &Notice) -> Result<(), CoreError> {
        self.update(notice, &self.check_run.status, None)
            .await
            .map_err(|e| e.into_core(self.name()))
    }

    async fn post_final(&self, notice: &Notice, conclusion: Conclusion) -> Result<(), CoreError> {
        self.update(notice, "completed", Some(conclusion))
            .await
            .map_err(|e| e.into_core(self.name()))
    }

    async fn delete_state(&self) -> Result<(), CoreError> {
        self.state
            .delete(KIND)
            .await
            .map_err(|e| e.into_core(self.name()))
    }
}
