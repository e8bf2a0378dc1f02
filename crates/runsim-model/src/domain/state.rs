use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Persisted record identifying the in-flight check run or chat thread a
/// notification sink appends to.
///
/// The orchestrator never reads the attributes; only the sink that owns the
/// record interprets them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationState {
    /// Integration type, also the record key (e.g. `"Slack"`, `"GitHub"`).
    pub kind: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl IntegrationState {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Attribute value, failing when it is absent or empty.
    pub fn require(&self, key: &str) -> Result<&str, ModelError> {
        match self.get(key) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(ModelError::MissingAttribute(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_rejects_missing_and_empty() {
        let state = IntegrationState::new("Slack")
            .with("ChannelID", "C123")
            .with("MessageTS", "");

        assert_eq!(state.require("ChannelID"), Ok("C123"));
        assert_eq!(
            state.require("MessageTS"),
            Err(ModelError::MissingAttribute("MessageTS".into()))
        );
        assert!(state.require("Nope").is_err());
    }

    #[test]
    fn serde_uses_camel_case() {
        let state = IntegrationState::new("GitHub").with("PrNum", "12");
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, r#"{"kind":"GitHub","attributes":{"PrNum":"12"}}"#);

        let back: IntegrationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
