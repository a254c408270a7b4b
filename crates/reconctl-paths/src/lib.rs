//! Path Guard: confines every artifact and tool-output path written by a
//! Run to that Run's output directory.
//!
//! Stage output paths are partly derived from tool-controlled strings
//! (target hostnames, discovered subdomains, crawled URLs) and must never be
//! trusted as-is. Every path that reaches the filesystem goes through a
//! `SandboxRoot`, which rejects absolute paths, `..` traversal, and
//! symlink/hardlink escapes before touching disk. Fails closed: anything
//! ambiguous is treated as an escape attempt.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("sandbox root {0} does not exist")]
    RootNotFound(Utf8PathBuf),

    #[error("sandbox root {0} is not a directory")]
    RootNotDirectory(Utf8PathBuf),

    #[error("failed to canonicalize sandbox root {path}: {source}")]
    RootCanonicalizationFailed {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("path contains a parent-directory component: {0}")]
    ParentTraversal(Utf8PathBuf),

    #[error("absolute paths are not allowed inside the sandbox: {0}")]
    AbsolutePath(Utf8PathBuf),

    #[error("path escapes sandbox root: {0}")]
    EscapeAttempt(Utf8PathBuf),

    #[error("symlinks are not allowed inside the sandbox: {0}")]
    SymlinkNotAllowed(Utf8PathBuf),

    #[error("hardlinks are not allowed inside the sandbox: {0}")]
    HardlinkNotAllowed(Utf8PathBuf),

    #[error("failed to canonicalize path {path}: {source}")]
    PathCanonicalizationFailed {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What the sandbox permits beyond the strict default. Every field defaults
/// to `false`; a Run root should only relax these for narrow, documented
/// reasons (e.g. a stage that legitimately symlinks a cached wordlist in).
#[derive(Debug, Clone, Copy, Default)]
pub struct SandboxConfig {
    pub allow_symlinks: bool,
    pub allow_hardlinks: bool,
}

impl SandboxConfig {
    pub fn permissive() -> Self {
        Self {
            allow_symlinks: true,
            allow_hardlinks: true,
        }
    }
}

/// A validated root directory. All paths are joined and checked relative to
/// this root; the root itself is canonicalized once at construction.
#[derive(Debug, Clone)]
pub struct SandboxRoot {
    root: Utf8PathBuf,
    config: SandboxConfig,
}

/// A path that has been validated to live inside a `SandboxRoot`.
#[derive(Debug, Clone)]
pub struct SandboxPath {
    full: Utf8PathBuf,
    rel: Utf8PathBuf,
}

impl SandboxPath {
    pub fn as_path(&self) -> &Utf8Path {
        &self.full
    }

    pub fn relative(&self) -> &Utf8Path {
        &self.rel
    }

    pub fn to_path_buf(&self) -> Utf8PathBuf {
        self.full.clone()
    }
}

impl SandboxRoot {
    pub fn new(root: impl AsRef<Utf8Path>) -> Result<Self, SandboxError> {
        Self::with_config(root, SandboxConfig::default())
    }

    pub fn new_default(root: impl AsRef<Utf8Path>) -> Result<Self, SandboxError> {
        Self::new(root)
    }

    pub fn with_config(root: impl AsRef<Utf8Path>, config: SandboxConfig) -> Result<Self, SandboxError> {
        let root = root.as_ref();
        let meta = fs::metadata(root).map_err(|_| SandboxError::RootNotFound(root.to_path_buf()))?;
        if !meta.is_dir() {
            return Err(SandboxError::RootNotDirectory(root.to_path_buf()));
        }
        let canonical = fs::canonicalize(root).map_err(|source| SandboxError::RootCanonicalizationFailed {
            path: root.to_path_buf(),
            source,
        })?;
        let canonical = Utf8PathBuf::from_path_buf(canonical)
            .map_err(|_| SandboxError::RootNotDirectory(root.to_path_buf()))?;
        Ok(Self { root: canonical, config })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Validate and join `rel` onto the sandbox root. Rejects absolute
    /// paths and `..` components up front, before any filesystem access, so
    /// an escape attempt never even stats a file outside the root.
    pub fn join(&self, rel: impl AsRef<Utf8Path>) -> Result<SandboxPath, SandboxError> {
        let rel = rel.as_ref();

        if rel.is_absolute() {
            return Err(SandboxError::AbsolutePath(rel.to_path_buf()));
        }
        if rel.components().any(|c| c.as_str() == "..") {
            return Err(SandboxError::ParentTraversal(rel.to_path_buf()));
        }

        let full = self.root.join(rel);

        match fs::symlink_metadata(&full) {
            Ok(meta) => {
                if meta.file_type().is_symlink() {
                    if !self.config.allow_symlinks {
                        return Err(SandboxError::SymlinkNotAllowed(full));
                    }
                    self.check_symlinks_in_path(&full)?;
                }
                if !self.config.allow_hardlinks {
                    self.check_hardlink(&full, &meta)?;
                }
                let canonical = fs::canonicalize(&full).map_err(|source| SandboxError::PathCanonicalizationFailed {
                    path: full.clone(),
                    source,
                })?;
                let canonical = Utf8PathBuf::from_path_buf(canonical)
                    .map_err(|_| SandboxError::EscapeAttempt(full.clone()))?;
                self.assert_contains(&canonical, &full)?;
            }
            Err(_) => {
                // Path doesn't exist yet (a stage about to write an
                // artifact). Walk up to the nearest existing ancestor and
                // make sure *that* doesn't escape via a symlinked ancestor
                // directory. A path can be nonexistent yet still escape if
                // an ancestor directory is a symlink pointing outside root.
                self.validate_ancestor_within_sandbox(&full)?;
            }
        }

        let rel_normalized = full
            .strip_prefix(&self.root)
            .map_err(|_| SandboxError::EscapeAttempt(full.clone()))?
            .to_path_buf();

        Ok(SandboxPath {
            full,
            rel: rel_normalized,
        })
    }

    fn assert_contains(&self, canonical: &Utf8Path, original: &Utf8Path) -> Result<(), SandboxError> {
        if !canonical.starts_with(&self.root) {
            return Err(SandboxError::EscapeAttempt(original.to_path_buf()));
        }
        Ok(())
    }

    fn check_symlinks_in_path(&self, full: &Utf8Path) -> Result<(), SandboxError> {
        let mut current = self.root.clone();
        if let Ok(rel) = full.strip_prefix(&self.root) {
            for component in rel.components() {
                current = current.join(component.as_str());
                if let Ok(meta) = fs::symlink_metadata(&current) {
                    if meta.file_type().is_symlink() {
                        let target = fs::canonicalize(&current).map_err(|source| {
                            SandboxError::PathCanonicalizationFailed {
                                path: current.clone(),
                                source,
                            }
                        })?;
                        let target = Utf8PathBuf::from_path_buf(target)
                            .map_err(|_| SandboxError::EscapeAttempt(current.clone()))?;
                        if !target.starts_with(&self.root) {
                            return Err(SandboxError::EscapeAttempt(current.clone()));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    #[cfg(unix)]
    fn check_hardlink(&self, full: &Utf8Path, meta: &fs::Metadata) -> Result<(), SandboxError> {
        use std::os::unix::fs::MetadataExt;
        // Unknown or ambiguous link count is treated as a hardlink: fail
        // closed rather than assume the common case.
        if meta.nlink() != 1 {
            return Err(SandboxError::HardlinkNotAllowed(full.to_path_buf()));
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn check_hardlink(&self, full: &Utf8Path, _meta: &fs::Metadata) -> Result<(), SandboxError> {
        let _ = full;
        Ok(())
    }

    fn validate_ancestor_within_sandbox(&self, full: &Utf8Path) -> Result<(), SandboxError> {
        let mut candidate = full.to_path_buf();
        loop {
            if candidate == self.root {
                return Ok(());
            }
            match fs::symlink_metadata(&candidate) {
                Ok(meta) => {
                    if meta.file_type().is_symlink() && !self.config.allow_symlinks {
                        return Err(SandboxError::SymlinkNotAllowed(candidate));
                    }
                    let canonical =
                        fs::canonicalize(&candidate).map_err(|source| SandboxError::PathCanonicalizationFailed {
                            path: candidate.clone(),
                            source,
                        })?;
                    let canonical = Utf8PathBuf::from_path_buf(canonical)
                        .map_err(|_| SandboxError::EscapeAttempt(candidate.clone()))?;
                    if !canonical.starts_with(&self.root) {
                        return Err(SandboxError::EscapeAttempt(candidate));
                    }
                    return Ok(());
                }
                Err(_) => {
                    let Some(parent) = candidate.parent() else {
                        return Err(SandboxError::EscapeAttempt(full.to_path_buf()));
                    };
                    candidate = parent.to_path_buf();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> (tempfile::TempDir, SandboxRoot) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let sandbox = SandboxRoot::new(root).unwrap();
        (dir, sandbox)
    }

    #[test]
    fn joins_plain_relative_path() {
        let (dir, sandbox) = sandbox();
        fs::write(dir.path().join("out.txt"), b"x").unwrap();
        let joined = sandbox.join("out.txt").unwrap();
        assert!(joined.as_path().as_std_path().exists());
    }

    #[test]
    fn rejects_absolute_path() {
        let (_dir, sandbox) = sandbox();
        let err = sandbox.join("/etc/passwd").unwrap_err();
        assert!(matches!(err, SandboxError::AbsolutePath(_)));
    }

    #[test]
    fn rejects_parent_traversal() {
        let (_dir, sandbox) = sandbox();
        let err = sandbox.join("../escape.txt").unwrap_err();
        assert!(matches!(err, SandboxError::ParentTraversal(_)));
    }

    #[test]
    fn rejects_nested_parent_traversal() {
        let (_dir, sandbox) = sandbox();
        let err = sandbox.join("subdomains/../../escape.txt").unwrap_err();
        assert!(matches!(err, SandboxError::ParentTraversal(_)));
    }

    #[test]
    fn allows_nonexistent_nested_path_within_root() {
        let (_dir, sandbox) = sandbox();
        let joined = sandbox.join("stage_output/new_file.json").unwrap();
        assert!(joined.relative().as_str().contains("stage_output"));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_symlink_escaping_root_by_default() {
        let (dir, sandbox) = sandbox();
        let outside = tempfile::tempdir().unwrap();
        let link = dir.path().join("escape_link");
        std::os::unix::fs::symlink(outside.path(), &link).unwrap();
        let err = sandbox.join("escape_link").unwrap_err();
        assert!(matches!(err, SandboxError::SymlinkNotAllowed(_)));
    }
}
