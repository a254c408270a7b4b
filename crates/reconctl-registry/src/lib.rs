//! Tool Registry: resolves the name of a required external binary (e.g.
//! `subfinder`, `httpx`, `nuclei`) to an absolute path, or records it as
//! unavailable. Consulted once per Run before any Stage executes, never at
//! invocation time — the Process Runner receives an already-resolved
//! absolute path.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::sync::RwLock;

/// Outcome of resolving one tool name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolLocation {
    Absolute(Utf8PathBuf),
    NotInstalled,
}

impl ToolLocation {
    pub fn path(&self) -> Option<&Utf8Path> {
        match self {
            ToolLocation::Absolute(path) => Some(path.as_path()),
            ToolLocation::NotInstalled => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ToolLocation::Absolute(_))
    }
}

/// Per-Run tool resolution, cached after first lookup. Resolution order:
/// (a) explicit config override, (b) a repo-local `bin/` directory, (c) the
/// system `PATH`.
pub struct ToolRegistry {
    overrides: HashMap<String, Utf8PathBuf>,
    local_bin: Option<Utf8PathBuf>,
    cache: RwLock<HashMap<String, ToolLocation>>,
}

impl ToolRegistry {
    pub fn new(overrides: HashMap<String, Utf8PathBuf>, local_bin: Option<Utf8PathBuf>) -> Self {
        Self {
            overrides,
            local_bin,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(HashMap::new(), None)
    }

    /// Resolve `name`, consulting (and populating) the per-Run cache. A
    /// second call for the same name always returns the same result, even
    /// if the environment changes mid-Run.
    pub fn locate(&self, name: &str) -> ToolLocation {
        if let Some(cached) = self.cache.read().unwrap().get(name) {
            return cached.clone();
        }

        let resolved = self.resolve_uncached(name);
        self.cache
            .write()
            .unwrap()
            .insert(name.to_string(), resolved.clone());
        resolved
    }

    fn resolve_uncached(&self, name: &str) -> ToolLocation {
        if let Some(overridden) = self.overrides.get(name) {
            if overridden.as_std_path().is_file() {
                return ToolLocation::Absolute(overridden.clone());
            }
            return ToolLocation::NotInstalled;
        }

        if let Some(local_bin) = &self.local_bin {
            let candidate = local_bin.join(name);
            if candidate.as_std_path().is_file() {
                return ToolLocation::Absolute(candidate);
            }
        }

        match which::which(name) {
            Ok(path) => match Utf8PathBuf::from_path_buf(path) {
                Ok(path) => ToolLocation::Absolute(path),
                Err(_) => ToolLocation::NotInstalled,
            },
            Err(_) => ToolLocation::NotInstalled,
        }
    }

    /// A structured readiness report over every tool a caller cares about,
    /// used by `reconctl doctor` (§10.3) to preflight the whole Stage
    /// catalog's tool dependencies before a Run starts.
    pub fn readiness_report(&self, names: &[&str]) -> Vec<(String, ToolLocation)> {
        names
            .iter()
            .map(|name| (name.to_string(), self.locate(name)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fn make_executable(dir: &std::path::Path, name: &str) -> Utf8PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        Utf8PathBuf::from_path_buf(path).unwrap()
    }

    #[test]
    fn override_wins_over_local_bin_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let overridden = make_executable(dir.path(), "subfinder");
        let mut overrides = HashMap::new();
        overrides.insert("subfinder".to_string(), overridden.clone());
        let registry = ToolRegistry::new(overrides, None);

        assert_eq!(registry.locate("subfinder"), ToolLocation::Absolute(overridden));
    }

    #[test]
    fn falls_back_to_local_bin_dir() {
        let dir = tempfile::tempdir().unwrap();
        let local = make_executable(dir.path(), "amass");
        let registry = ToolRegistry::new(
            HashMap::new(),
            Some(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap()),
        );
        assert_eq!(registry.locate("amass"), ToolLocation::Absolute(local));
    }

    #[test]
    fn unknown_tool_is_not_installed() {
        let registry = ToolRegistry::empty();
        assert_eq!(
            registry.locate("definitely-not-a-real-recon-tool-xyz"),
            ToolLocation::NotInstalled
        );
    }

    #[test]
    fn second_lookup_returns_cached_result() {
        let dir = tempfile::tempdir().unwrap();
        let local_bin = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let registry = ToolRegistry::new(HashMap::new(), Some(local_bin));

        // Not installed on first lookup.
        assert_eq!(registry.locate("ffuf"), ToolLocation::NotInstalled);
        // Even if it now appears on disk, the cached miss is returned.
        make_executable(dir.path(), "ffuf");
        assert_eq!(registry.locate("ffuf"), ToolLocation::NotInstalled);
    }

    #[test]
    fn readiness_report_covers_every_requested_tool() {
        let registry = ToolRegistry::empty();
        let report = registry.readiness_report(&["subfinder", "amass", "nuclei"]);
        assert_eq!(report.len(), 3);
    }
}
