use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("seed list is empty")]
    EmptySeedList,
    #[error("cannot convert seed {value:?} to integer")]
    InvalidSeed { value: String },
    #[error("seed {0} listed more than once")]
    DuplicateSeed(i64),
    #[error("invalid duration: {0}")]
    InvalidDuration(String),
    #[error("missing attribute: {0}")]
    MissingAttribute(String),
    #[error("failed to format timestamp: {0}")]
    Timestamp(String),
}
