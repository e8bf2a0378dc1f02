//! Where sinks find their per-run settings and credentials.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use runsim_model::IntegrationState;

use crate::error::SinkError;

/// Integration state rows keyed by integration kind (`Slack`, `GitHub`).
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, kind: &str) -> Result<Option<IntegrationState>, SinkError>;
    async fn delete(&self, kind: &str) -> Result<(), SinkError>;
}

/// Named secrets such as API tokens.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn secret(&self, name: &str) -> Result<String, SinkError>;
}

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    rows: Mutex<HashMap<String, IntegrationState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, state: IntegrationState) -> Self {
        self.lock().insert(state.kind.clone(), state);
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, IntegrationState>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.lock().contains_key(kind)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, kind: &str) -> Result<Option<IntegrationState>, SinkError> {
        Ok(self.lock().get(kind).cloned())
    }

    async fn delete(&self, kind: &str) -> Result<(), SinkError> {
        self.lock().remove(kind);
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretStore for StaticSecrets {
    async fn secret(&self, name: &str) -> Result<String, SinkError> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| SinkError::Secret(format!("{name} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_load_and_delete() {
        let store = MemoryStateStore::new().with(IntegrationState::new("Slack").with("ChannelID", "C1"));
        let row = store.load("Slack").await.unwrap().unwrap();
        assert_eq!(row.get("ChannelID"), Some("C1"));
        assert!(store.load("GitHub").await.unwrap().is_none());

        store.delete("Slack").await.unwrap();
        assert!(!store.contains("Slack"));
    }

    #[tokio::test]
    async fn missing_secret_is_an_error() {
        let secrets = StaticSecrets::new().with("slack-app-key", "xoxb");
        assert_eq!(secrets.secret("slack-app-key").await.unwrap(), "xoxb");
        assert!(matches!(
            secrets.secret("github-sim-app-key").await,
            Err(SinkError::Secret(_))
        ));
    }
}
