use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sqs::Client;
use runsim_core::{CoreError, TokenSource};
use tracing::{debug, warn};

use crate::error::AwsError;

const VISIBILITY_TIMEOUT_SECS: i32 = 30;
const WAIT_TIME_SECS: i32 = 1;

/// Fleet completion tokens held in an SQS queue.
///
/// The queue is looked up by name prefix on every check, so a missing queue
/// surfaces as a failed check rather than a setup error. A token is consumed
/// by receiving one message and deleting it. If the delete fails the message
/// reappears after the visibility timeout, but the token still counts as
/// consumed here.
pub struct SqsTokenSource {
    client: Client,
    prefix: String,
}

impl SqsTokenSource {
    pub fn new(config: &SdkConfig, prefix: impl Into<String>) -> Self {
        Self {
            client: Client::new(config),
            prefix: prefix.into(),
        }
    }

    /// URL of the first queue whose name starts with the prefix.
    async fn queue_url(&self) -> Result<String, AwsError> {
        let out = self
            .client
            .list_queues()
            .queue_name_prefix(&self.prefix)
            .send()
            .await
            .map_err(AwsError::sdk("sqs:ListQueues"))?;

        out.queue_urls()
            .first()
            .cloned()
            .ok_or_else(|| AwsError::QueueNotFound(self.prefix.clone()))
    }

    async fn consume(&self) -> Result<bool, AwsError> {
        let queue_url = self.queue_url().await?;
        let out = self
            .client
            .receive_message()
            .queue_url(&queue_url)
            .max_number_of_messages(1)
            .visibility_timeout(VISIBILITY_TIMEOUT_SECS)
            .wait_time_seconds(WAIT_TIME_SECS)
            .send()
            .await
            .map_err(AwsError::sdk("sqs:ReceiveMessage"))?;

        let Some(message) = out.messages().first() else {
            return Ok(false);
        };
        debug!(target: "runsim.aws", id = ?message.message_id(), "fleet token received");

        match message.receipt_handle() {
            Some(handle) => {
                if let Err(e) = self
                    .client
                    .delete_message()
                    .queue_url(&queue_url)
                    .receipt_handle(handle)
                    .send()
                    .await
                {
                    warn!(
                        target: "runsim.aws",
                        error = %aws_sdk_sqs::error::DisplayErrorContext(e),
                        "failed to delete fleet token"
                    );
                }
            }
            None => warn!(target: "runsim.aws", "fleet token has no receipt handle"),
        }
        Ok(true)
    }
}

#[async_trait]
impl TokenSource for SqsTokenSource {
    async fn try_consume(&self) -> Result<bool, CoreError> {
        Ok(self.consume().await?)
    }
}
