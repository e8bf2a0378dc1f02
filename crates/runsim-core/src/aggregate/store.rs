use std::{
    fmt,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tracing::debug;

use crate::error::CoreError;

const DEFAULT_PREFIX: &str = "debug";

/// Object key `{prefix}/{host_id}/{filename}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub prefix: String,
    pub host_id: String,
    pub filename: String,
}

impl ObjectKey {
    /// An empty prefix becomes `debug`. A `/` in the host id becomes `-` so
    /// the key always splits back into the same three parts.
    pub fn new(prefix: &str, host_id: &str, filename: impl Into<String>) -> Self {
        let prefix = prefix.trim_matches('/');
        Self {
            prefix: if prefix.is_empty() {
                DEFAULT_PREFIX.to_string()
            } else {
                prefix.to_string()
            },
            host_id: host_id.replace('/', "-"),
            filename: filename.into(),
        }
    }

    /// Key for a local file, named after the file.
    pub fn for_file(prefix: &str, host_id: &str, path: &Path) -> Result<Self, CoreError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| CoreError::InvalidKey(path.display().to_string()))?;
        Ok(Self::new(prefix, host_id, filename))
    }

    /// Split a key back into its parts. The prefix may itself contain `/`.
    pub fn parse(key: &str) -> Result<Self, CoreError> {
        let mut parts = key.rsplitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(filename), Some(host_id), Some(prefix))
                if !filename.is_empty() && !host_id.is_empty() && !prefix.is_empty() =>
            {
                Ok(Self {
                    prefix: prefix.to_string(),
                    host_id: host_id.to_string(),
                    filename: filename.to_string(),
                })
            }
            _ => Err(CoreError::InvalidKey(key.to_string())),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.prefix, self.host_id, self.filename)
    }
}

/// Object storage for archives and logs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload `file` under `key` and return the URL it can be fetched from.
    async fn put(&self, key: &ObjectKey, file: &Path) -> Result<String, CoreError>;
}

/// Stores objects under a local directory and hands out `file://` URLs.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn url(&self, key: &ObjectKey) -> String {
        format!("file://{}", self.root.join(key.to_string()).display())
    }

    /// Inverse of [`url`](Self::url).
    pub fn key_from_url(&self, url: &str) -> Result<ObjectKey, CoreError> {
        let root = format!("file://{}/", self.root.display());
        url.strip_prefix(&root)
            .ok_or_else(|| CoreError::InvalidKey(url.to_string()))
            .and_then(ObjectKey::parse)
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &ObjectKey, file: &Path) -> Result<String, CoreError> {
        let upload_err = |e: std::io::Error| CoreError::Upload {
            key: key.to_string(),
            reason: e.to_string(),
        };
        let dest = self.root.join(key.to_string());
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(upload_err)?;
        }
        tokio::fs::copy(file, &dest).await.map_err(upload_err)?;
        debug!(target: "runsim.aggregate", %key, dest = %dest.display(), "stored locally");
        Ok(self.url(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_prefix_defaults_to_debug() {
        let key = ObjectKey::new("", "host-1", "ok.zip");
        assert_eq!(key.to_string(), "debug/host-1/ok.zip");
        assert_eq!(ObjectKey::new("/nightly/", "h", "f").to_string(), "nightly/h/f");
    }

    #[test]
    fn key_parses_back_into_parts() {
        let key = ObjectKey::new("pr/1234", "i-0abc", "failed.zip");
        let parsed = ObjectKey::parse(&key.to_string()).unwrap();
        assert_eq!(parsed, key);
        assert_eq!(parsed.prefix, "pr/1234");

        assert!(ObjectKey::parse("only/two").is_err());
        assert!(ObjectKey::parse("a//c").is_err());
    }

    #[test]
    fn slash_in_host_id_keeps_round_trip() {
        let key = ObjectKey::new("ci", "rack/7", "ok.zip");
        assert_eq!(key.host_id, "rack-7");
        assert_eq!(key.to_string(), "ci/rack-7/ok.zip");

        let parsed = ObjectKey::parse(&key.to_string()).unwrap();
        assert_eq!(parsed, key);
        assert_eq!(parsed.prefix, "ci");
    }

    #[tokio::test]
    async fn local_store_url_round_trips() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("source.txt");
        std::fs::write(&src, "payload").unwrap();

        let store = LocalBlobStore::new(root.path().join("bucket"));
        let key = ObjectKey::for_file("nightly", "host-7", &src).unwrap();
        let url = store.put(&key, &src).await.unwrap();

        assert!(url.starts_with("file://"));
        assert_eq!(store.key_from_url(&url).unwrap(), key);
        let stored = root.path().join("bucket/nightly/host-7/source.txt");
        assert_eq!(std::fs::read_to_string(stored).unwrap(), "payload");
    }
}
