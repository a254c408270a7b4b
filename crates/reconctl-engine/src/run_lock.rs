//! Run Lock: advisory, crash-tolerant exclusion so two `reconctl`
//! invocations never work the same run directory at once. Most relevant to
//! `--resume`, where two operators racing to continue the same scan would
//! otherwise both re-execute the same pending Stages.
//!
//! Mirrors the PID + timestamp + `fd_lock` idiom used elsewhere in this
//! codebase for crash-tolerant exclusive locks: the lock file is created
//! with `O_EXCL` semantics to close the TOCTOU window, then held open under
//! an `fd_lock::RwLock` for the Run's lifetime. A lock left behind by a
//! killed process is detected by checking whether its recorded PID is still
//! alive and, failing that, how old the file is.

use camino::{Utf8Path, Utf8PathBuf};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

const STALE_THRESHOLD_SECS: u64 = 3600;
const LOCK_FILE_NAME: &str = ".run.lock";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another reconctl process (PID {pid}) is already working this run, started {created_ago} ago")]
    ConcurrentRun { pid: u32, created_ago: String },

    #[error("run lock at {path} is corrupt: {reason}")]
    Corrupted { path: Utf8PathBuf, reason: String },

    #[error("failed to acquire run lock at {path}: {source}")]
    Acquire {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    created_at: u64,
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}

fn format_age(age_secs: u64) -> String {
    if age_secs < 60 {
        format!("{age_secs}s")
    } else if age_secs < 3600 {
        format!("{}m", age_secs / 60)
    } else {
        format!("{}h", age_secs / 3600)
    }
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    // kill(pid, 0) signals nothing; it only probes existence/permission.
    let rc = unsafe { libc::kill(pid as i32, 0) };
    rc == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
    // No cheap liveness probe off Unix; assume alive so a missing check
    // never silently steals another process's lock.
    true
}

/// Held for the lifetime of one `reconctl run`/`resume` invocation.
/// Dropping it releases the `fd_lock` and removes the lock file; a crash
/// leaves the file behind for the next invocation's staleness check.
pub struct RunLock {
    path: Utf8PathBuf,
    _fd_lock: RwLock<fs::File>,
}

impl RunLock {
    pub fn acquire(run_root: &Utf8Path) -> Result<Self, LockError> {
        let path = run_root.join(LOCK_FILE_NAME);

        match fs::OpenOptions::new().create_new(true).read(true).write(true).open(path.as_std_path()) {
            Ok(file) => Self::finalize(path, file),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                Self::assert_stale(&path)?;
                fs::remove_file(path.as_std_path()).map_err(|source| LockError::Acquire { path: path.clone(), source })?;
                let file = fs::OpenOptions::new()
                    .create_new(true)
                    .read(true)
                    .write(true)
                    .open(path.as_std_path())
                    .map_err(|source| LockError::Acquire { path: path.clone(), source })?;
                Self::finalize(path, file)
            }
            Err(source) => Err(LockError::Acquire { path, source }),
        }
    }

    fn finalize(path: Utf8PathBuf, file: fs::File) -> Result<Self, LockError> {
        let info = LockInfo { pid: process::id(), created_at: now_secs() };
        let json = serde_json::to_string_pretty(&info).expect("lock info serialization is infallible");

        let mut fd_lock = RwLock::new(file);
        {
            let mut guard = fd_lock.try_write().map_err(|_| LockError::ConcurrentRun {
                pid: info.pid,
                created_ago: "just now".to_string(),
            })?;
            guard.write_all(json.as_bytes()).map_err(|source| LockError::Acquire { path: path.clone(), source })?;
            guard.sync_all().map_err(|source| LockError::Acquire { path: path.clone(), source })?;
        }

        Ok(Self { path, _fd_lock: fd_lock })
    }

    /// Checks a pre-existing lock file. Returns `Ok(())` only when the
    /// recorded process is dead and the file is older than
    /// [`STALE_THRESHOLD_SECS`] — the one case this engine auto-clears,
    /// since the exposed CLI has no `--force` override for it.
    fn assert_stale(path: &Utf8Path) -> Result<(), LockError> {
        let content = fs::read_to_string(path.as_std_path()).map_err(|source| LockError::Acquire {
            path: path.to_path_buf(),
            source,
        })?;
        let info: LockInfo = serde_json::from_str(&content)
            .map_err(|err| LockError::Corrupted { path: path.to_path_buf(), reason: err.to_string() })?;

        let age_secs = now_secs().saturating_sub(info.created_at);
        if is_process_running(info.pid) || age_secs <= STALE_THRESHOLD_SECS {
            return Err(LockError::ConcurrentRun { pid: info.pid, created_ago: format_age(age_secs) });
        }
        Ok(())
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(self.path.as_std_path());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_and_releases_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        {
            let _lock = RunLock::acquire(root).unwrap();
            assert!(root.join(LOCK_FILE_NAME).as_std_path().exists());
        }
        assert!(!root.join(LOCK_FILE_NAME).as_std_path().exists());
    }

    #[test]
    fn second_acquire_while_first_still_held_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let _first = RunLock::acquire(root).unwrap();
        let err = RunLock::acquire(root).unwrap_err();
        assert!(matches!(err, LockError::ConcurrentRun { .. }));
    }

    #[test]
    fn stale_lock_from_dead_pid_is_auto_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let path = root.join(LOCK_FILE_NAME);
        // PID 0 never corresponds to a live user process under kill(2); the
        // timestamp is old enough to clear STALE_THRESHOLD_SECS.
        let info = LockInfo { pid: 0, created_at: 1 };
        fs::write(path.as_std_path(), serde_json::to_string(&info).unwrap()).unwrap();

        let lock = RunLock::acquire(root);
        assert!(lock.is_ok());
    }

    #[test]
    fn fresh_lock_from_dead_pid_is_not_auto_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let path = root.join(LOCK_FILE_NAME);
        let info = LockInfo { pid: 0, created_at: now_secs() };
        fs::write(path.as_std_path(), serde_json::to_string(&info).unwrap()).unwrap();

        let err = RunLock::acquire(root).unwrap_err();
        assert!(matches!(err, LockError::ConcurrentRun { .. }));
    }
}
