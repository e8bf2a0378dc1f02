use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::{Client, types::AttributeValue};
use runsim_model::IntegrationState;
use runsim_notify::{SinkError, StateStore};
use tracing::debug;

use crate::error::AwsError;

const PRIMARY_KEY: &str = "IntegrationType";

/// Integration state rows in a DynamoDB table keyed by integration kind.
pub struct DynamoStateStore {
    client: Client,
    table: String,
}

impl DynamoStateStore {
    pub fn new(config: &SdkConfig, table: impl Into<String>) -> Self {
        Self {
            client: Client::new(config),
            table: table.into(),
        }
    }
}

/// String attributes of `item`, without the primary key. Attributes of other
/// types are ignored.
fn state_from_item(kind: &str, item: &HashMap<String, AttributeValue>) -> IntegrationState {
    item.iter()
        .filter(|(name, _)| name.as_str() != PRIMARY_KEY)
        .filter_map(|(name, value)| value.as_s().ok().map(|s| (name, s)))
        .fold(IntegrationState::new(kind), |state, (name, s)| {
            state.with(name.clone(), s.clone())
        })
}

#[async_trait]
impl StateStore for DynamoStateStore {
    async fn load(&self, kind: &str) -> Result<Option<IntegrationState>, SinkError> {
        let out = self
            .client
            .get_item()
            .table_name(&self.table)
            .key(PRIMARY_KEY, AttributeValue::S(kind.to_string()))
            .send()
            .await
            .map_err(AwsError::sdk("dynamodb:GetItem"))?;

        debug!(target: "runsim.aws", table = %self.table, kind, found = out.item().is_some(), "state loaded");
        Ok(out.item().map(|item| state_from_item(kind, item)))
    }

    async fn delete(&self, kind: &str) -> Result<(), SinkError> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .key(PRIMARY_KEY, AttributeValue::S(kind.to_string()))
            .send()
            .await
            .map_err(AwsError::sdk("dynamodb:DeleteItem"))?;
        debug!(target: "runsim.aws", table = %self.table, kind, "state deleted");
        Ok(())
    }
}
