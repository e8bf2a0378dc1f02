mod error;
pub use error::SinkError;

mod markup;
pub use markup::Markup;

mod state;
pub use state::{MemoryStateStore, SecretStore, StateStore, StaticSecrets};

pub mod slack;
pub use slack::{SlackConfig, SlackSink};

pub mod github;
pub use github::{GitHubSink, GitHubTarget};

#[cfg(test)]
mod testing;
