use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ssm::Client;
use runsim_notify::{SecretStore, SinkError};

use crate::error::AwsError;

/// API tokens stored as encrypted SSM parameters.
pub struct SsmSecrets {
    client: Client,
}

impl SsmSecrets {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl SecretStore for SsmSecrets {
    async fn secret(&self, name: &str) -> Result<String, SinkError> {
        let out = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(AwsError::sdk("ssm:GetParameter"))?;

        out.parameter()
            .and_then(|p| p.value())
            .map(str::to_string)
            .ok_or(AwsError::Empty("ssm:GetParameter"))
            .map_err(SinkError::from)
    }
}
