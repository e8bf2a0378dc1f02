use runsim_core::CoreError;
use runsim_notify::SinkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AwsError {
    #[error("{op} failed: {reason}")]
    Sdk { op: &'static str, reason: String },
    #[error("no bucket name contains {0:?}")]
    BucketNotFound(String),
    #[error("no queue name starts with {0:?}")]
    QueueNotFound(String),
    #[error("{0} returned no value")]
    Empty(&'static str),
}

impl AwsError {
    /// Wrap an SDK error with its full source chain.
    pub(crate) fn sdk<E>(op: &'static str) -> impl FnOnce(E) -> AwsError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        move |e| AwsError::Sdk {
            op,
            reason: aws_sdk_s3::error::DisplayErrorContext(e).to_string(),
        }
    }
}

impl From<AwsError> for SinkError {
    fn from(e: AwsError) -> Self {
        SinkError::Store(e.to_string())
    }
}

impl From<AwsError> for CoreError {
    fn from(e: AwsError) -> Self {
        CoreError::Fleet(e.to_string())
    }
}
