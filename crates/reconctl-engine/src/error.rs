//! Errors the Pipeline Engine raises itself, outside of any Stage's own
//! terminal outcome. A Stage failing never surfaces here — only the
//! conditions spec §7 treats as fatal to the whole Run (authorization
//! absent, an unresumable journal, a Run-directory I/O failure) do.

use camino::Utf8PathBuf;
use reconctl_config::TargetError;
use reconctl_paths::SandboxError;
use reconctl_state::StateError;
use reconctl_store::StoreError;
use thiserror::Error;

use crate::run_lock::LockError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid target: {0}")]
    Target(#[from] TargetError),

    #[error("failed to prepare run directory {path}: {source}")]
    RunDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("cannot resume: {0}")]
    Resume(String),

    #[error("reading back {summary_json}: {reason}")]
    CorruptSummary { summary_json: Utf8PathBuf, reason: String },
}
