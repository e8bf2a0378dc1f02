//! AWS back-ends: S3 for uploads, SQS for fleet tokens, DynamoDB for
//! integration state and SSM for API tokens.

mod error;
pub use error::AwsError;

pub use aws_config::SdkConfig;

mod config;
pub use config::{
    AwsSettings, DEFAULT_BUCKET_PREFIX, DEFAULT_QUEUE_PREFIX, DEFAULT_REGION, DEFAULT_STATE_TABLE,
    load_sdk_config,
};

mod s3;
pub use s3::{S3BlobStore, public_url};

mod sqs;
pub use sqs::SqsTokenSource;

mod dynamo;
pub use dynamo::DynamoStateStore;

mod ssm;
pub use ssm::SsmSecrets;
