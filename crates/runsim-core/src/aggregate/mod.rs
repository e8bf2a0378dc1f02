//! Partitioning of outcomes into archives and publishing them to a blob store.

mod archive;
pub use archive::{Archive, ArchiveKind, zip_files};

mod store;
pub use store::{BlobStore, LocalBlobStore, ObjectKey};

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use runsim_model::RunOutcome;
use tracing::{info, warn};

use crate::error::CoreError;

/// Files of a finished run, split by what they belong to.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    /// Logs of passed seeds.
    pub ok: Vec<PathBuf>,
    /// Logs of failed seeds.
    pub failed: Vec<PathBuf>,
    /// Export files that exist on disk.
    pub exports: Vec<PathBuf>,
}

impl ArtifactSet {
    fn partition(&self, kind: ArchiveKind) -> &[PathBuf] {
        match kind {
            ArchiveKind::Ok => &self.ok,
            ArchiveKind::Failed => &self.failed,
            ArchiveKind::Exports => &self.exports,
        }
    }
}

/// Split outcomes into ok logs, failed logs and exports.
///
/// Exports are only written by simulations that got far enough, so missing
/// ones are skipped. A missing log means the process never started; it is
/// skipped too, with a warning.
pub fn aggregate(outcomes: &[RunOutcome]) -> ArtifactSet {
    let mut set = ArtifactSet::default();
    for outcome in outcomes {
        let logs = if outcome.failed {
            &mut set.failed
        } else {
            &mut set.ok
        };
        for log in outcome.logs() {
            if log.exists() {
                logs.push(log.clone());
            } else {
                warn!(target: "runsim.aggregate", seed = outcome.seed, path = %log.display(), "log file missing");
            }
        }
        set.exports
            .extend(outcome.exports().into_iter().filter(|p| p.exists()).cloned());
    }
    set
}

/// Write one archive per non-empty partition into `dir`.
pub fn bundle(set: &ArtifactSet, dir: &Path) -> Result<Vec<Archive>, CoreError> {
    let mut archives = Vec::new();
    for kind in [ArchiveKind::Ok, ArchiveKind::Failed, ArchiveKind::Exports] {
        let files = set.partition(kind);
        if files.is_empty() {
            continue;
        }
        let path = dir.join(kind.file_name());
        zip_files(&path, files)?;
        archives.push(Archive { kind, path });
    }
    Ok(archives)
}

/// A published archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLink {
    pub kind: ArchiveKind,
    pub url: String,
}

/// Bundles a run's outcomes and uploads them.
pub struct ResultAggregator {
    dir: PathBuf,
    store: Arc<dyn BlobStore>,
    prefix: String,
    host_id: String,
}

impl ResultAggregator {
    pub fn new(
        dir: impl Into<PathBuf>,
        store: Arc<dyn BlobStore>,
        prefix: impl Into<String>,
        host_id: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            store,
            prefix: prefix.into(),
            host_id: host_id.into(),
        }
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    /// Aggregate, compress and upload. Any failure aborts the whole step.
    pub async fn publish(&self, outcomes: &[RunOutcome]) -> Result<Vec<ArtifactLink>, CoreError> {
        let set = aggregate(outcomes);
        info!(
            target: "runsim.aggregate",
            ok = set.ok.len(),
            failed = set.failed.len(),
            exports = set.exports.len(),
            "bundling results"
        );

        let dir = self.dir.clone();
        let archives = tokio::task::spawn_blocking(move || bundle(&set, &dir))
            .await
            .map_err(|e| CoreError::Io(e.to_string()))??;

        let mut links = Vec::with_capacity(archives.len());
        for archive in &archives {
            let url = self.upload_file(&archive.path).await?;
            links.push(ArtifactLink {
                kind: archive.kind,
                url,
            });
        }
        Ok(links)
    }

    /// Upload a single file under `{prefix}/{host_id}/{file name}`.
    pub async fn upload_file(&self, path: &Path) -> Result<String, CoreError> {
        let key = ObjectKey::for_file(&self.prefix, &self.host_id, path)?;
        let url = self.store.put(&key, path).await?;
        info!(target: "runsim.aggregate", %key, %url, "uploaded");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, io::Read};

    use runsim_model::RunLayout;

    use super::*;

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    fn zip_names(path: &Path) -> Vec<String> {
        let mut archive = zip::ZipArchive::new(fs::File::open(path).unwrap()).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
        names.sort();
        // entries must be readable, not just listed
        let mut buf = String::new();
        archive.by_index(0).unwrap().read_to_string(&mut buf).unwrap();
        names
    }

    #[test]
    fn no_failures_means_no_failed_archive() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::with_stamp(dir.path(), "t");

        let a = layout.task(1);
        let b = layout.task(2);
        for p in [&a.stdout, &a.stderr, &b.stdout, &b.stderr, &a.export_params] {
            touch(p);
        }
        let outcomes = vec![a.succeeded(), b.succeeded()];

        let set = aggregate(&outcomes);
        assert_eq!(set.ok.len(), 4);
        assert!(set.failed.is_empty());
        assert_eq!(set.exports.len(), 1, "missing exports are skipped");

        let archives = bundle(&set, dir.path()).unwrap();
        let kinds: Vec<_> = archives.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ArchiveKind::Ok, ArchiveKind::Exports]);
        assert!(!dir.path().join("failed.zip").exists());
    }

    #[test]
    fn failed_seed_logs_go_to_failed_archive() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::with_stamp(dir.path(), "t");
        let task = layout.task(11);
        touch(&task.stdout);
        touch(&task.stderr);
        let stdout_name = task.stdout.file_name().unwrap().to_string_lossy().into_owned();
        let stderr_name = task.stderr.file_name().unwrap().to_string_lossy().into_owned();

        let set = aggregate(&[task.failed(Some("exit 1".into()))]);
        let archives = bundle(&set, dir.path()).unwrap();
        assert_eq!(archives.len(), 1);
        assert_eq!(archives[0].kind, ArchiveKind::Failed);

        let mut expected = vec![stdout_name, stderr_name];
        expected.sort();
        assert_eq!(zip_names(&archives[0].path), expected);
    }

    #[test]
    fn nothing_to_bundle_yields_no_archives() {
        let dir = tempfile::tempdir().unwrap();
        assert!(bundle(&ArtifactSet::default(), dir.path()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn publish_uploads_each_archive_under_host_key() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::with_stamp(dir.path(), "t");
        let task = layout.task(3);
        touch(&task.stdout);
        touch(&task.stderr);

        let store = LocalBlobStore::new(dir.path().join("bucket"));
        let agg = ResultAggregator::new(dir.path(), Arc::new(store.clone()), "", "host-a");
        let links = agg.publish(&[task.succeeded()]).await.unwrap();

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].kind, ArchiveKind::Ok);
        let key = store.key_from_url(&links[0].url).unwrap();
        assert_eq!(key, ObjectKey::new("debug", "host-a", "ok.zip"));
    }
}
