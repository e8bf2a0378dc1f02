use aws_config::{BehaviorVersion, Region, SdkConfig};

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_BUCKET_PREFIX: &str = "sim-logs-";
pub const DEFAULT_QUEUE_PREFIX: &str = "gaia-sim-";
pub const DEFAULT_STATE_TABLE: &str = "SimulationState";

#[derive(Debug, Clone)]
pub struct AwsSettings {
    pub region: String,
    /// Upload bucket: the first whose name contains this.
    pub bucket_prefix: String,
    /// Fleet queue: the first whose name starts with this.
    pub queue_prefix: String,
    pub state_table: String,
}

impl Default for AwsSettings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            bucket_prefix: DEFAULT_BUCKET_PREFIX.to_string(),
            queue_prefix: DEFAULT_QUEUE_PREFIX.to_string(),
            state_table: DEFAULT_STATE_TABLE.to_string(),
        }
    }
}

pub async fn load_sdk_config(settings: &AwsSettings) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()))
        .load()
        .await
}
