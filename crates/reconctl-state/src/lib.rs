//! State Journal: a JSON record of per-Stage terminal outcomes for the
//! current Run, enabling `--resume` (spec §4.8).
//!
//! The journal is rewritten in full, atomically, after every Stage reaches
//! a terminal state. On `--resume` it is read back before the Pipeline
//! Engine builds its DAG: if the target or effective config hash differ
//! from what produced the journal, resuming is refused outright (a
//! mismatch is a fatal error, not a best-effort merge). Otherwise every
//! stage recorded `Ok` is treated as already satisfied and is not
//! re-executed; anything recorded `Running` (a journal written mid-crash)
//! is treated as not-yet-done.

use camino::Utf8Path;
use reconctl_utils::atomic_write::{self, AtomicWriteError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to write state journal to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: AtomicWriteError,
    },

    #[error("failed to read state journal from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("state journal at {path} is not valid JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(
        "refusing to resume: recorded target {recorded_target:?} does not match requested target {requested_target:?}"
    )]
    TargetMismatch {
        recorded_target: String,
        requested_target: String,
    },

    #[error(
        "refusing to resume: effective configuration changed since the last run (recorded hash {recorded}, current {current}) \
         — run without --resume to start a fresh scan"
    )]
    ConfigMismatch { recorded: String, current: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordedState {
    Running,
    Ok,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalStageEntry {
    pub name: String,
    pub state: RecordedState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub duration_ms: u64,
}

/// The full per-Run journal, serialized to `.state.json` at the Run root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Journal {
    pub run_id: String,
    pub target: String,
    pub config_hash: String,
    pub stages: Vec<JournalStageEntry>,
}

impl Journal {
    pub fn new(run_id: impl Into<String>, target: impl Into<String>, config_hash: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            target: target.into(),
            config_hash: config_hash.into(),
            stages: Vec::new(),
        }
    }

    /// Record (or replace) the terminal state of `stage`. Called once per
    /// Stage after it leaves RUNNING, immediately followed by [`Self::write`].
    pub fn record(&mut self, name: impl Into<String>, state: RecordedState, reason: Option<String>, duration_ms: u64) {
        let name = name.into();
        if let Some(existing) = self.stages.iter_mut().find(|s| s.name == name) {
            existing.state = state;
            existing.reason = reason;
            existing.duration_ms = duration_ms;
        } else {
            self.stages.push(JournalStageEntry {
                name,
                state,
                reason,
                duration_ms,
            });
        }
    }

    /// Stages already satisfied by a prior run and therefore skippable on
    /// resume. Only `Ok` counts — `Failed`/`Skipped`/`Running` stages are
    /// re-attempted (invariant #5: an OK stage's work must not repeat).
    pub fn completed_ok_stages(&self) -> HashSet<&str> {
        self.stages
            .iter()
            .filter(|s| s.state == RecordedState::Ok)
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn entry(&self, name: &str) -> Option<&JournalStageEntry> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn write(&self, path: &Utf8Path) -> Result<(), StateError> {
        let content = serde_json::to_vec_pretty(self).expect("Journal serialization is infallible");
        atomic_write::write_file_atomic(path, &content).map_err(|source| StateError::Write {
            path: path.to_string(),
            source,
        })?;
        Ok(())
    }

    pub fn load(path: &Utf8Path) -> Result<Self, StateError> {
        let content = std::fs::read_to_string(path.as_std_path()).map_err(|source| StateError::Read {
            path: path.to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| StateError::Parse {
            path: path.to_string(),
            source,
        })
    }

    /// Validate that a loaded journal matches the current invocation before
    /// honoring `--resume` (spec §4.8). Fails closed: any mismatch aborts
    /// resume rather than attempting a partial merge.
    pub fn check_resumable(&self, requested_target: &str, current_config_hash: &str) -> Result<(), StateError> {
        if self.target != requested_target {
            return Err(StateError::TargetMismatch {
                recorded_target: self.target.clone(),
                requested_target: requested_target.to_string(),
            });
        }
        if self.config_hash != current_config_hash {
            return Err(StateError::ConfigMismatch {
                recorded: self.config_hash.clone(),
                current: current_config_hash.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn journal_path(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(".state.json")).unwrap()
    }

    #[test]
    fn record_replaces_existing_entry_for_same_stage() {
        let mut journal = Journal::new("run-1", "example.com", "hash-a");
        journal.record("passive_enum", RecordedState::Running, None, 0);
        journal.record("passive_enum", RecordedState::Ok, None, 1500);
        assert_eq!(journal.stages.len(), 1);
        assert_eq!(journal.stages[0].state, RecordedState::Ok);
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = journal_path(&dir);
        let mut journal = Journal::new("run-1", "example.com", "hash-a");
        journal.record("passive_enum", RecordedState::Ok, None, 1200);
        journal.record("probe_http", RecordedState::Skipped, Some("circuit-open".into()), 50);
        journal.write(&path).unwrap();

        let loaded = Journal::load(&path).unwrap();
        assert_eq!(loaded.run_id, "run-1");
        assert_eq!(loaded.stages.len(), 2);
        assert_eq!(loaded.entry("probe_http").unwrap().reason.as_deref(), Some("circuit-open"));
    }

    #[test]
    fn completed_ok_stages_excludes_non_ok_terminal_states() {
        let mut journal = Journal::new("run-1", "example.com", "hash-a");
        journal.record("passive_enum", RecordedState::Ok, None, 100);
        journal.record("wordlist_enum", RecordedState::Skipped, Some("passive-only".into()), 0);
        journal.record("dns_resolve", RecordedState::Failed, Some("parse error".into()), 10);
        let completed = journal.completed_ok_stages();
        assert!(completed.contains("passive_enum"));
        assert!(!completed.contains("wordlist_enum"));
        assert!(!completed.contains("dns_resolve"));
    }

    #[test]
    fn check_resumable_rejects_target_mismatch() {
        let journal = Journal::new("run-1", "example.com", "hash-a");
        let err = journal.check_resumable("other.com", "hash-a").unwrap_err();
        assert!(matches!(err, StateError::TargetMismatch { .. }));
    }

    #[test]
    fn check_resumable_rejects_config_hash_mismatch() {
        let journal = Journal::new("run-1", "example.com", "hash-a");
        let err = journal.check_resumable("example.com", "hash-b").unwrap_err();
        assert!(matches!(err, StateError::ConfigMismatch { .. }));
    }

    #[test]
    fn check_resumable_accepts_matching_target_and_hash() {
        let journal = Journal::new("run-1", "example.com", "hash-a");
        assert!(journal.check_resumable("example.com", "hash-a").is_ok());
    }
}
