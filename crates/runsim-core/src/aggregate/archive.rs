use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use tracing::debug;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::error::CoreError;

/// One of the three archives a run can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArchiveKind {
    Ok,
    Failed,
    Exports,
}

impl ArchiveKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ArchiveKind::Ok => "ok.zip",
            ArchiveKind::Failed => "failed.zip",
            ArchiveKind::Exports => "exports.zip",
        }
    }
}

/// An archive written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub kind: ArchiveKind,
    pub path: PathBuf,
}

/// Write `files` into a deflate zip at `dest`, one entry per file named
/// after the file itself.
pub fn zip_files(dest: &Path, files: &[PathBuf]) -> Result<(), CoreError> {
    let archive_err = |reason: String| CoreError::Archive {
        path: dest.to_path_buf(),
        reason,
    };
    debug!(target: "runsim.aggregate", archive = %dest.display(), files = files.len(), "compressing");

    let out = File::create(dest).map_err(|e| archive_err(e.to_string()))?;
    let mut zip = ZipWriter::new(out);
    let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| archive_err(format!("{} has no file name", path.display())))?;
        zip.start_file(name, opts)
            .map_err(|e| archive_err(e.to_string()))?;

        let mut src = File::open(path)
            .map_err(|e| archive_err(format!("{}: {e}", path.display())))?;
        io::copy(&mut src, &mut zip).map_err(|e| archive_err(e.to_string()))?;
    }
    zip.finish().map_err(|e| archive_err(e.to_string()))?;
    Ok(())
}
