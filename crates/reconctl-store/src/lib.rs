//! Artifact Store: the append-only per-run directory every Stage writes
//! into.
//!
//! A Run owns one directory, `<output>/<target>_<UTC-timestamp>/`, laid out
//! per spec §6. Every write goes through [`SandboxRoot`] first and then
//! through [`reconctl_utils::atomic_write`], so a reader never observes a
//! half-written file and a path never lands outside the Run root. An
//! artifact, once written, is immutable for the rest of the Run — a second
//! write to the same id is a programming error, not a silent overwrite.

use camino::{Utf8Path, Utf8PathBuf};
use reconctl_paths::{SandboxError, SandboxPath, SandboxRoot};
use reconctl_utils::atomic_write::{self, AtomicWriteError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact path escapes the run root: {0}")]
    PathEscape(#[from] SandboxError),

    #[error("artifact {0} was already written in this run")]
    AlreadyWritten(ArtifactId),

    #[error("failed to write artifact {id}: {source}")]
    Write {
        id: ArtifactId,
        #[source]
        source: AtomicWriteError,
    },

    #[error("failed to serialize artifact {id} to JSON: {source}")]
    Serialize {
        id: ArtifactId,
        #[source]
        source: serde_json::Error,
    },
}

/// Identifies one artifact: the Stage that produced it plus a logical name
/// unique within that Stage (e.g. `passive_enum` / `passive.txt`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId {
    pub stage: String,
    pub name: String,
}

impl ArtifactId {
    pub fn new(stage: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.stage, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    TextLines,
    Json,
    Binary,
}

/// Record of one written artifact. Immutable once constructed; retained for
/// the lifetime of the Run so the Aggregator and `--resume` can check
/// existence and checksum without re-reading every file.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub id_stage: String,
    pub id_name: String,
    pub path: Utf8PathBuf,
    pub content_type: ContentType,
    pub size: u64,
    pub sha256: String,
}

/// The fixed subdirectory layout under a Run root (spec §6).
pub mod layout {
    pub const SUBDOMAINS_PASSIVE: &str = "subdomains/passive.txt";
    pub const SUBDOMAINS_BRUTE: &str = "subdomains/brute.txt";
    pub const SUBDOMAINS_ALL: &str = "subdomains/all.txt";
    pub const SUBDOMAINS_RESOLVED: &str = "subdomains/resolved.json";
    pub const SUBDOMAINS_LIVE: &str = "subdomains/live.txt";
    pub const HTTP_HTTPX: &str = "http/httpx.json";
    pub const ENDPOINTS_URLS: &str = "endpoints/urls.txt";
    pub const JS_FILES: &str = "js/files.txt";
    pub const JS_SECRETS: &str = "js/secrets.txt";
    pub const JS_ENDPOINTS: &str = "js/endpoints.txt";
    pub const VULNS_TAKEOVERS: &str = "vulns/takeovers.json";
    pub const VULNS_NUCLEI: &str = "vulns/nuclei.json";
    pub const PARAMS_PARAMETERS: &str = "params/parameters.txt";
    pub const REPORTS_SUMMARY_MD: &str = "reports/summary.md";
    pub const REPORTS_FULL_HTML: &str = "reports/full_report.html";
    pub const SUMMARY_JSON: &str = "summary.json";
    pub const STATE_JOURNAL: &str = ".state.json";
    pub const SCAN_LOG: &str = "scan.log";

    pub fn screenshot(host: &str) -> String {
        format!("screenshots/{host}.png")
    }

    pub fn dir_fuzz(host: &str) -> String {
        format!("endpoints/dirs/{host}.json")
    }

    pub fn nmap(host: &str) -> String {
        format!("nmap/{host}.txt")
    }
}

/// Append-only artifact store scoped to one Run directory.
pub struct ArtifactStore {
    root: SandboxRoot,
    written: RwLock<HashMap<ArtifactId, Artifact>>,
}

impl ArtifactStore {
    pub fn new(root: SandboxRoot) -> Self {
        Self {
            root,
            written: RwLock::new(HashMap::new()),
        }
    }

    pub fn run_root(&self) -> &Utf8Path {
        self.root.root()
    }

    /// Validate `rel` against the sandbox without writing anything. Used by
    /// `--resume` to check a previously recorded artifact still exists.
    pub fn resolve(&self, rel: impl AsRef<Utf8Path>) -> Result<SandboxPath, StoreError> {
        Ok(self.root.join(rel)?)
    }

    pub fn get(&self, id: &ArtifactId) -> Option<Artifact> {
        self.written.read().unwrap().get(id).cloned()
    }

    pub fn list(&self) -> Vec<Artifact> {
        let mut artifacts: Vec<_> = self.written.read().unwrap().values().cloned().collect();
        artifacts.sort_by(|a, b| (&a.id_stage, &a.id_name).cmp(&(&b.id_stage, &b.id_name)));
        artifacts
    }

    fn record(&self, id: ArtifactId, rel: &Utf8Path, content_type: ContentType, bytes_written: u64, sha256: String) -> Artifact {
        let artifact = Artifact {
            id_stage: id.stage.clone(),
            id_name: id.name.clone(),
            path: rel.to_path_buf(),
            content_type,
            size: bytes_written,
            sha256,
        };
        self.written.write().unwrap().insert(id, artifact.clone());
        artifact
    }

    fn guard_unwritten(&self, id: &ArtifactId) -> Result<(), StoreError> {
        if self.written.read().unwrap().contains_key(id) {
            return Err(StoreError::AlreadyWritten(id.clone()));
        }
        Ok(())
    }

    /// Write a newline-joined, already-sorted/deduped list of lines
    /// (`subdomains/all.txt` and friends).
    pub fn write_lines(
        &self,
        id: ArtifactId,
        rel_path: impl AsRef<Utf8Path>,
        lines: &[String],
    ) -> Result<Artifact, StoreError> {
        self.guard_unwritten(&id)?;
        let rel_path = rel_path.as_ref();
        let sandbox_path = self.root.join(rel_path)?;
        let mut content = lines.join("\n");
        if !lines.is_empty() {
            content.push('\n');
        }
        let result = atomic_write::write_file_atomic(sandbox_path.as_path(), content.as_bytes())
            .map_err(|source| StoreError::Write { id: id.clone(), source })?;
        Ok(self.record(id, rel_path, ContentType::TextLines, result.bytes_written, result.sha256))
    }

    pub fn write_json<T: Serialize>(
        &self,
        id: ArtifactId,
        rel_path: impl AsRef<Utf8Path>,
        value: &T,
    ) -> Result<Artifact, StoreError> {
        self.guard_unwritten(&id)?;
        let rel_path = rel_path.as_ref();
        let sandbox_path = self.root.join(rel_path)?;
        let content = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serialize { id: id.clone(), source })?;
        let result = atomic_write::write_file_atomic(sandbox_path.as_path(), &content)
            .map_err(|source| StoreError::Write { id: id.clone(), source })?;
        Ok(self.record(id, rel_path, ContentType::Json, result.bytes_written, result.sha256))
    }

    pub fn write_bytes(
        &self,
        id: ArtifactId,
        rel_path: impl AsRef<Utf8Path>,
        content: &[u8],
    ) -> Result<Artifact, StoreError> {
        self.guard_unwritten(&id)?;
        let rel_path = rel_path.as_ref();
        let sandbox_path = self.root.join(rel_path)?;
        let result = atomic_write::write_file_atomic(sandbox_path.as_path(), content)
            .map_err(|source| StoreError::Write { id: id.clone(), source })?;
        Ok(self.record(id, rel_path, ContentType::Binary, result.bytes_written, result.sha256))
    }

    pub fn write_text(
        &self,
        id: ArtifactId,
        rel_path: impl AsRef<Utf8Path>,
        content: &str,
    ) -> Result<Artifact, StoreError> {
        self.write_bytes(id, rel_path, content.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let sandbox = SandboxRoot::new(root).unwrap();
        (dir, ArtifactStore::new(sandbox))
    }

    #[test]
    fn write_lines_sorts_nothing_itself_but_joins_and_terminates() {
        let (_dir, store) = store();
        let id = ArtifactId::new("merge_subdomains", "all.txt");
        let artifact = store
            .write_lines(id, layout::SUBDOMAINS_ALL, &["bar.example.com".into(), "foo.example.com".into()])
            .unwrap();
        let content = std::fs::read_to_string(store.run_root().join(layout::SUBDOMAINS_ALL)).unwrap();
        assert_eq!(content, "bar.example.com\nfoo.example.com\n");
        assert_eq!(artifact.content_type, ContentType::TextLines);
    }

    #[test]
    fn second_write_to_same_id_is_rejected() {
        let (_dir, store) = store();
        let id = ArtifactId::new("passive_enum", "passive.txt");
        store.write_lines(id.clone(), layout::SUBDOMAINS_PASSIVE, &[]).unwrap();
        let err = store.write_lines(id, layout::SUBDOMAINS_PASSIVE, &[]).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyWritten(_)));
    }

    #[test]
    fn write_json_round_trips() {
        let (_dir, store) = store();
        let id = ArtifactId::new("aggregate", "summary.json");
        #[derive(Serialize)]
        struct Payload {
            n: u32,
        }
        let artifact = store.write_json(id, layout::SUMMARY_JSON, &Payload { n: 7 }).unwrap();
        assert_eq!(artifact.content_type, ContentType::Json);
        let content = std::fs::read_to_string(store.run_root().join(layout::SUMMARY_JSON)).unwrap();
        assert!(content.contains("\"n\": 7"));
    }

    #[test]
    fn write_rejects_path_escaping_root() {
        let (_dir, store) = store();
        let id = ArtifactId::new("crawl", "evil");
        let err = store.write_text(id, "../escape.txt", "x").unwrap_err();
        assert!(matches!(err, StoreError::PathEscape(_)));
    }

    #[test]
    fn list_returns_every_written_artifact_sorted() {
        let (_dir, store) = store();
        store
            .write_lines(ArtifactId::new("b_stage", "x.txt"), "b.txt", &[])
            .unwrap();
        store
            .write_lines(ArtifactId::new("a_stage", "x.txt"), "a.txt", &[])
            .unwrap();
        let listed = store.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id_stage, "a_stage");
    }
}
