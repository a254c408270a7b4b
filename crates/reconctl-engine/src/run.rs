//! Run orchestration: turns an effective [`Config`] into a prepared Run
//! directory, then hands the Stage catalog to [`crate::pipeline::execute`].
//!
//! Everything here runs once per invocation, before any tool is spawned:
//! resolve the target safety check, pick (or find, for `--resume`) the Run
//! root, acquire the [`RunLock`], and assemble every collaborator a
//! [`RunContext`] needs. None of it is Stage-specific — that is exactly
//! why it lives in the engine and not in `reconctl-stages`.

use crate::error::EngineError;
use crate::pipeline::{self, AlreadyOk};
use crate::run_lock::RunLock;
use camino::{Utf8Path, Utf8PathBuf};
use reconctl_config::{reject_disallowed_ips, Config};
use reconctl_governor::{BreakerRegistry, Cancellation, CircuitBreakerConfig, Governor, GovernorConfig};
use reconctl_paths::SandboxRoot;
use reconctl_redaction::SecretRedactor;
use reconctl_registry::ToolRegistry;
use reconctl_runner::NativeProcessRunner;
use reconctl_stage::{RunContext, Stage, StageLog, StageRecord};
use reconctl_state::Journal;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// What a completed (or cancelled-midway) Run produced, for the caller
/// (the `reconctl` binary) to report and decide an exit code from.
pub struct RunOutcome {
    pub run_id: String,
    pub run_root: Utf8PathBuf,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub ended_at: chrono::DateTime<chrono::Utc>,
    pub stage_log: Vec<StageRecord>,
}

/// Best-effort DNS safety check (spec §3 invariant). A target that fails to
/// resolve at all is left to the Stages themselves to skip/fail on — only a
/// target that *does* resolve to disallowed address space is rejected here.
async fn check_target_safety(config: &Config) -> Result<(), EngineError> {
    for target in &config.targets {
        if let Ok(ip) = target.fqdn().parse::<IpAddr>() {
            reject_disallowed_ips(target.fqdn(), &[ip])?;
            continue;
        }
        match tokio::net::lookup_host((target.fqdn(), 0)).await {
            Ok(addrs) => {
                let ips: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
                reject_disallowed_ips(target.fqdn(), &ips)?;
            }
            Err(err) => {
                tracing::warn!(target = target.fqdn(), error = %err, "DNS resolution failed during pre-flight safety check; proceeding");
            }
        }
    }
    Ok(())
}

fn run_dir_prefix(fqdn: &str) -> String {
    format!("{fqdn}_")
}

/// Finds the most recently started Run directory for `fqdn` under
/// `output_dir`, per `StatusArgs`' documented "most recently started run"
/// default (spec §10.4). Directory names sort chronologically because the
/// timestamp suffix is a fixed-width, zero-padded UTC stamp.
fn find_resumable_run_dir(output_dir: &Utf8Path, fqdn: &str) -> Option<Utf8PathBuf> {
    let prefix = run_dir_prefix(fqdn);
    let mut candidates: Vec<Utf8PathBuf> = std::fs::read_dir(output_dir.as_std_path())
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.path()).ok())
        .filter(|path| path.file_name().map(|name| name.starts_with(&prefix)).unwrap_or(false))
        .collect();
    candidates.sort();
    candidates.pop()
}

fn new_run_dir(output_dir: &Utf8Path, fqdn: &str, started_at: chrono::DateTime<chrono::Utc>) -> Utf8PathBuf {
    let stamp = started_at.format("%Y%m%dT%H%M%SZ");
    output_dir.join(format!("{}{stamp}", run_dir_prefix(fqdn)))
}

/// A Run directory picked (or found, for `--resume`) and locked, but with
/// no Stage yet executed. Split out from [`run`] so the caller (the
/// `reconctl` binary) can learn `run_root` — to open `scan.log` there —
/// before any Stage's output starts arriving.
pub struct PreparedRun {
    pub run_id: String,
    pub run_root: Utf8PathBuf,
    pub started_at: chrono::DateTime<chrono::Utc>,
    lock: RunLock,
}

/// Resolve the target safety check, the Run directory (new or resumed),
/// and the Run Lock. Does not touch the Stage catalog or any tool.
pub async fn prepare(config: &Config) -> Result<PreparedRun, EngineError> {
    check_target_safety(config).await?;

    let primary = config
        .targets
        .first()
        .expect("ConfigBuilder::build refuses a config with no targets")
        .fqdn()
        .to_string();

    let started_at = chrono::Utc::now();

    std::fs::create_dir_all(config.output_dir.as_std_path()).map_err(|source| EngineError::RunDirectory {
        path: config.output_dir.clone(),
        source,
    })?;

    let run_root = if config.resume {
        find_resumable_run_dir(&config.output_dir, &primary)
            .ok_or_else(|| EngineError::Resume(format!("no prior run directory found for {primary} under {}", config.output_dir)))?
    } else {
        let dir = new_run_dir(&config.output_dir, &primary, started_at);
        std::fs::create_dir_all(dir.as_std_path()).map_err(|source| EngineError::RunDirectory { path: dir.clone(), source })?;
        dir
    };
    let run_id = run_root
        .file_name()
        .map(str::to_string)
        .unwrap_or_else(|| primary.clone());

    let lock = RunLock::acquire(&run_root)?;

    Ok(PreparedRun {
        run_id,
        run_root,
        started_at,
        lock,
    })
}

/// Run every Stage in the catalog against an already-[`prepare`]d Run
/// directory. `cancellation` is owned by the caller so a SIGINT handler
/// installed in `main` can trip it independently of this function's
/// lifetime.
pub async fn execute_prepared(prepared: PreparedRun, config: Arc<Config>, cancellation: Cancellation) -> Result<RunOutcome, EngineError> {
    let PreparedRun {
        run_id,
        run_root,
        started_at,
        lock: _lock,
    } = prepared;

    let primary = config
        .targets
        .first()
        .expect("ConfigBuilder::build refuses a config with no targets")
        .fqdn()
        .to_string();

    let sandbox = SandboxRoot::new(&run_root)?;
    let store = Arc::new(reconctl_store::ArtifactStore::new(sandbox));

    let registry = Arc::new(ToolRegistry::new(config.tool_overrides.clone(), config.local_bin.clone()));
    let runner = Arc::new(NativeProcessRunner::new());
    let governor = Governor::new(GovernorConfig { permits: config.threads });
    let breakers = Arc::new(BreakerRegistry::new(CircuitBreakerConfig {
        threshold: config.circuit_breaker.threshold,
        cooldown: config.circuit_breaker.cooldown,
        cooldown_cap: config.circuit_breaker.cooldown_cap,
    }));
    let redactor = Arc::new(SecretRedactor::new());
    let stage_log = Arc::new(StageLog::new());

    let stages: Vec<Arc<dyn Stage>> = reconctl_stages::catalog();
    let stage_names: Vec<&str> = stages.iter().map(|s| s.name()).collect();
    let config_hash = config.config_hash(&stage_names);

    let state_path = run_root.join(reconctl_store::layout::STATE_JOURNAL);
    let (journal, already_ok) = if config.resume && state_path.as_std_path().exists() {
        let journal = Journal::load(&state_path)?;
        journal.check_resumable(&primary, &config_hash)?;
        let already_ok: AlreadyOk = journal.completed_ok_stages().into_iter().map(str::to_string).collect();
        (journal, already_ok)
    } else if config.resume {
        tracing::warn!(run_root = %run_root, "resume requested but no state journal found; starting fresh");
        (Journal::new(run_id.clone(), primary.clone(), config_hash), AlreadyOk::new())
    } else {
        (Journal::new(run_id.clone(), primary.clone(), config_hash), AlreadyOk::new())
    };
    let journal = Arc::new(AsyncMutex::new(journal));

    let ctx = RunContext {
        run_id: run_id.clone(),
        started_at,
        config: config.clone(),
        store: store.clone(),
        registry,
        runner,
        governor,
        breakers,
        cancellation,
        redactor,
        stage_log,
    };

    let stage_log = pipeline::execute(&ctx, &stages, &already_ok, journal).await;
    let ended_at = chrono::Utc::now();

    Ok(RunOutcome {
        run_id,
        run_root,
        started_at,
        ended_at,
        stage_log,
    })
}

/// Convenience wrapper combining [`prepare`] and [`execute_prepared`] for
/// callers (and tests) that have no need to observe `run_root` before the
/// pipeline starts.
pub async fn run(config: Arc<Config>, cancellation: Cancellation) -> Result<RunOutcome, EngineError> {
    let prepared = prepare(&config).await?;
    execute_prepared(prepared, config, cancellation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconctl_config::{ConfigBuilder, RunArgs};

    fn args(domain: &str, output: &Utf8Path) -> RunArgs {
        RunArgs {
            domain: vec![domain.to_string()],
            output: Some(output.to_path_buf()),
            threads: Some(2),
            wordlist: None,
            passive_only: true,
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

    #[tokio::test]
    async fn run_creates_a_run_directory_and_completes_all_catalog_stages() {
        let dir = tempfile::tempdir().unwrap();
        let output = Utf8Path::from_path(dir.path()).unwrap();
        let config = Arc::new(ConfigBuilder::new(args("example.com", output)).build().unwrap());

        let outcome = run(config, Cancellation::new()).await.unwrap();

        assert!(outcome.run_root.as_std_path().starts_with(output.as_std_path()));
        assert!(outcome.run_root.join(".state.json").as_std_path().exists());
        assert!(outcome.stage_log.iter().any(|r| r.name == "aggregate"));
        assert!(outcome.stage_log.iter().any(|r| r.name == "report"));
    }

    #[tokio::test]
    async fn resume_without_a_prior_run_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let output = Utf8Path::from_path(dir.path()).unwrap();
        let mut run_args = args("example.com", output);
        run_args.resume = true;
        let config = Arc::new(ConfigBuilder::new(run_args).build().unwrap());

        let err = run(config, Cancellation::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::Resume(_)));
    }

    #[tokio::test]
    async fn resuming_a_completed_run_replays_no_stages() {
        let dir = tempfile::tempdir().unwrap();
        let output = Utf8Path::from_path(dir.path()).unwrap();
        let config = Arc::new(ConfigBuilder::new(args("example.com", output)).build().unwrap());
        let first = run(config.clone(), Cancellation::new()).await.unwrap();
        assert!(first.stage_log.iter().all(|r| r.state != reconctl_stage::TerminalState::Failed));

        let mut resumed_args = args("example.com", output);
        resumed_args.resume = true;
        let resumed_config = Arc::new(ConfigBuilder::new(resumed_args).build().unwrap());
        let second = run(resumed_config, Cancellation::new()).await.unwrap();
        assert_eq!(second.run_root, first.run_root);
    }

    #[tokio::test]
    async fn resume_rejects_a_changed_config_hash() {
        let dir = tempfile::tempdir().unwrap();
        let output = Utf8Path::from_path(dir.path()).unwrap();
        let config = Arc::new(ConfigBuilder::new(args("example.com", output)).build().unwrap());
        run(config, Cancellation::new()).await.unwrap();

        let mut resumed_args = args("example.com", output);
        resumed_args.resume = true;
        resumed_args.threads = Some(99);
        let resumed_config = Arc::new(ConfigBuilder::new(resumed_args).build().unwrap());
        let err = run(resumed_config, Cancellation::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::State(_)));
    }
}
