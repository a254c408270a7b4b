//! Shared test fixtures for the Stage catalog: a `RunContext` wired to a
//! temp-dir artifact store, a `StubProcessRunner`, and a tool registry whose
//! "installed" tools are real (no-op) executables under a scratch `bin/`
//! directory — so `ToolRegistry::locate` behaves exactly as it does in
//! production, just against fixtures instead of real recon tools.

use camino::Utf8PathBuf;
use reconctl_config::{ConfigBuilder, RunArgs};
use reconctl_governor::{BreakerRegistry, Cancellation, CircuitBreakerConfig, Governor, GovernorConfig};
use reconctl_paths::SandboxRoot;
use reconctl_redaction::SecretRedactor;
use reconctl_registry::ToolRegistry;
use reconctl_runner::stub::StubProcessRunner;
use reconctl_stage::{RunContext, StageLog};
use reconctl_store::ArtifactStore;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::sync::Arc;

pub struct TestTools {
    bin_dir: tempfile::TempDir,
    registry: Arc<ToolRegistry>,
    runner: Arc<StubProcessRunner>,
}

impl TestTools {
    pub fn install(&self, name: &str) {
        let path = self.bin_dir.path().join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
    }

    pub fn stub(&self) -> &StubProcessRunner {
        &self.runner
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        self.registry.clone()
    }
}

fn minimal_args(domains: &[&str]) -> RunArgs {
    RunArgs {
        domain: domains.iter().map(|d| d.to_string()).collect(),
        output: None,
        threads: None,
        wordlist: None,
        passive_only: false,
        include: Vec::new(),
        exclude: Vec::new(),
        resume: false,
        config: None,
        webhook: None,
        authorized: true,
        strict: false,
        log_format: None,
    }
}

pub async fn test_context(domains: &[&str]) -> (tempfile::TempDir, RunContext, TestTools) {
    test_context_with_scope(domains, &[], &[]).await
}

pub async fn test_context_with_scope(
    domains: &[&str],
    include: &[&str],
    exclude: &[&str],
) -> (tempfile::TempDir, RunContext, TestTools) {
    let run_dir = tempfile::tempdir().unwrap();
    let bin_dir = tempfile::tempdir().unwrap();
    let sandbox_root = Utf8PathBuf::from_path_buf(run_dir.path().to_path_buf()).unwrap();
    let bin_path = Utf8PathBuf::from_path_buf(bin_dir.path().to_path_buf()).unwrap();

    let sandbox = SandboxRoot::new(&sandbox_root).unwrap();
    let store = Arc::new(ArtifactStore::new(sandbox));
    let registry = Arc::new(ToolRegistry::new(Default::default(), Some(bin_path)));
    let runner = Arc::new(StubProcessRunner::new());

    let mut args = minimal_args(domains);
    args.include = include.iter().map(|s| s.to_string()).collect();
    args.exclude = exclude.iter().map(|s| s.to_string()).collect();
    let config = Arc::new(ConfigBuilder::new(args).build().unwrap());

    let ctx = RunContext {
        run_id: "test-run".to_string(),
        started_at: chrono::Utc::now(),
        config,
        store,
        registry: registry.clone(),
        runner: runner.clone(),
        governor: Governor::new(GovernorConfig { permits: 10 }),
        breakers: Arc::new(BreakerRegistry::new(CircuitBreakerConfig::default())),
        cancellation: Cancellation::new(),
        redactor: Arc::new(SecretRedactor::new()),
        stage_log: Arc::new(StageLog::new()),
    };

    let tools = TestTools {
        bin_dir,
        registry,
        runner,
    };

    (run_dir, ctx, tools)
}
