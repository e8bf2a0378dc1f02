use runsim_core::CoreError;
use runsim_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{method} rejected: {error}")]
    Api { method: String, error: String },
    #[error("no {0} integration state found")]
    MissingState(String),
    #[error(transparent)]
    State(#[from] ModelError),
    #[error("invalid attribute {key}: {value}")]
    InvalidAttribute { key: String, value: String },
    #[error("no active check run named {0}")]
    NoActiveCheckRun(String),
    #[error("state store: {0}")]
    Store(String),
    #[error("secret store: {0}")]
    Secret(String),
}

impl SinkError {
    pub fn into_core(self, sink: &str) -> CoreError {
        CoreError::Notify {
            sink: sink.to_string(),
            reason: self.to_string(),
        }
    }
}
