//! Posts run notices into a Slack thread.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use runsim_core::{Conclusion, CoreError, Notice, NotificationSink};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::SinkError,
    markup::Markup,
    state::{SecretStore, StateStore},
};

pub const DEFAULT_API_BASE: &str = "https://slack.com/api";
pub const DEFAULT_TOKEN_NAME: &str = "slack-app-key";

const KIND: &str = "Slack";
const CHANNEL_ID: &str = "ChannelID";
const MESSAGE_TS: &str = "MessageTS";

#[derive(Debug, Clone)]
pub struct SlackConfig {
    pub token: String,
    pub channel: String,
    /// Timestamp of the thread's parent message.
    pub thread_ts: String,
    pub api_base: String,
}

pub struct SlackSink {
    http: Client,
    cfg: SlackConfig,
    state: Arc<dyn StateStore>,
}

#[derive(Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    thread_ts: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackSink {
    pub fn new(cfg: SlackConfig, state: Arc<dyn StateStore>) -> Self {
        Self {
            http: Client::new(),
            cfg,
            state,
        }
    }

    /// Build the sink from the `Slack` state row and the token named
    /// `token_name`. Channel and thread must both be set.
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
        let token = secrets.secret(token_name).await?;

        let cfg = SlackConfig {
            token,
            channel: row.require(CHANNEL_ID)?.to_string(),
            thread_ts: row.require(MESSAGE_TS)?.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        };
        Ok(Self::new(cfg, state))
    }

    pub async fn post_message(&self, text: &str) -> Result<(), SinkError> {
        let body = PostMessage {
            channel: &self.cfg.channel,
            thread_ts: &self.cfg.thread_ts,
            text,
        };
        let reply: ApiReply = self
            .http
            .post(format!("{}/chat.postMessage", self.cfg.api_base))
            .bearer_auth(&self.cfg.token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !reply.ok {
            return Err(SinkError::Api {
                method: "chat.postMessage".to_string(),
                error: reply.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }
        debug!(target: "runsim.slack", channel = %self.cfg.channel, "message posted");
        Ok(())
    }
}

fn closing_line(conclusion: Conclusion) -> &'static str {
    match conclusion {
        Conclusion::Success => "Simulation is finished!",
        Conclusion::Failure => "Simulation failed!",
        Conclusion::Neutral => ":warning: Simulation finished with unknown completion status",
    }
}

#[async_trait]
impl NotificationSink for SlackSink {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn post_progress(&self, notice: &Notice) -> Result<(), CoreError> {
        self.post_message(&Markup::Slack.render(notice))
            .await
            .map_err(|e| e.into_core(self.name()))
    }

    async fn post_final(&self, notice: &Notice, conclusion: Conclusion) -> Result<(), CoreError> {
        self.post_progress(notice).await?;
        self.post_message(closing_line(conclusion))
            .await
            .map_err(|e| e.into_core(self.name()))
    }

    /// The thread is closed only by the last machine.
    async fn post_failure(&self, notice: &Notice) -> Result<(), CoreError> {
        self.post_progress(notice).await
    }

    async fn delete_state(&self) -> Result<(), CoreError> {
        self.state
            .delete(KIND)
            .await
            .map_err(|e| e.into_core(self.name()))
    }
}
