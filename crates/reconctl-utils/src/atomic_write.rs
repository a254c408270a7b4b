//! Atomic file writes: temp file + fsync + rename.
//!
//! Every artifact in a Run is written through this module so that a reader
//! never observes a half-written file (spec invariant: "Artifact ... Written
//! atomically (tmp + rename); never rewritten within a run").

use camino::Utf8Path;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AtomicWriteError {
    #[error("failed to create parent directory for {path}: {source}")]
    CreateParent { path: String, source: io::Error },

    #[error("failed to create temporary file in {dir}: {source}")]
    CreateTemp { dir: String, source: io::Error },

    #[error("failed to write contents to temporary file: {0}")]
    Write(#[source] io::Error),

    #[error("failed to fsync temporary file: {0}")]
    Sync(#[source] io::Error),

    #[error("failed to rename temporary file into place at {path}: {source}")]
    Rename { path: String, source: io::Error },
}

/// Outcome of an atomic write, including the content hash for the Artifact
/// record (spec: Artifact.sha256).
#[derive(Debug, Clone)]
pub struct AtomicWriteResult {
    pub bytes_written: u64,
    pub sha256: String,
}

/// Atomically write `content` to `path`.
///
/// Writes to a sibling temp file in the same directory (so the final rename
/// is same-filesystem and therefore atomic on every platform this engine
/// targets), fsyncs it, then renames over the destination.
pub fn write_file_atomic(path: &Utf8Path, content: &[u8]) -> Result<AtomicWriteResult, AtomicWriteError> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    fs::create_dir_all(parent).map_err(|source| AtomicWriteError::CreateParent {
        path: parent.to_string(),
        source,
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|source| AtomicWriteError::CreateTemp {
        dir: parent.to_string(),
        source,
    })?;

    temp.write_all(content).map_err(AtomicWriteError::Write)?;
    temp.as_file().sync_all().map_err(AtomicWriteError::Sync)?;

    temp.persist(path.as_std_path())
        .map_err(|e| AtomicWriteError::Rename {
            path: path.to_string(),
            source: e.error,
        })?;

    let mut hasher = Sha256::new();
    hasher.update(content);
    let sha256 = hex::encode(hasher.finalize());

    Ok(AtomicWriteResult {
        bytes_written: content.len() as u64,
        sha256,
    })
}

/// Remove a file if it exists, ignoring `NotFound`. Used by cancellation
/// cleanup to guarantee no half-written artifact survives (spec §5:
/// "no half-files").
pub fn remove_if_exists(path: &Utf8Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn temp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, base)
    }

    #[test]
    fn writes_content_and_returns_matching_hash() {
        let (_dir, base) = temp_dir();
        let path = base.join("a/b/out.txt");
        let result = write_file_atomic(&path, b"hello world").unwrap();

        assert_eq!(fs::read(path.as_std_path()).unwrap(), b"hello world");
        assert_eq!(result.bytes_written, 11);

        let mut hasher = Sha256::new();
        hasher.update(b"hello world");
        assert_eq!(result.sha256, hex::encode(hasher.finalize()));
    }

    #[test]
    fn overwrite_never_leaves_partial_content_on_disk() {
        let (_dir, base) = temp_dir();
        let path = base.join("out.txt");
        write_file_atomic(&path, b"first").unwrap();
        write_file_atomic(&path, b"second, longer content").unwrap();
        assert_eq!(fs::read(path.as_std_path()).unwrap(), b"second, longer content");
    }

    #[test]
    fn remove_if_exists_is_noop_when_missing() {
        let (_dir, base) = temp_dir();
        let path = base.join("nope.txt");
        assert!(remove_if_exists(&path).is_ok());
    }

    #[test]
    fn no_tmp_files_left_behind_after_write() {
        let (_dir, base) = temp_dir();
        let path = base.join("out.txt");
        write_file_atomic(&path, b"x").unwrap();
        let leftovers: Vec<_> = fs::read_dir(base.as_std_path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
