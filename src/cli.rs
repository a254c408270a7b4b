//! Top-level dispatch: parse [`reconctl_config::Cli`], run the matched
//! subcommand, map whatever comes back to a process exit code (spec §10.2).
//! `reconctl-config` owns every argument type already — this module's job
//! is orchestration, not parsing.

use crate::{doctor, logging, status};
use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use reconctl_config::{Cli, Command, Config, ConfigBuilder, RunArgs};
use reconctl_governor::Cancellation;
use std::sync::Arc;

/// Parses `argv`, dispatches, and returns the process exit code. `main`'s
/// only remaining job is to hand this to `std::process::exit`.
pub fn run() -> i32 {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("reconctl: failed to start async runtime: {err}");
            return reconctl_utils::exit_codes::FATAL_INTERNAL;
        }
    };

    match runtime.block_on(dispatch()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("reconctl: error: {err:#}");
            exit_code_for(&err)
        }
    }
}

async fn dispatch() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run_recon(args, false).await,
        Command::Resume(args) => run_recon(args, true).await,
        Command::Doctor(args) => doctor::run(args),
        Command::Status(args) => status::run(args),
    }
}

fn build_config(args: RunArgs) -> anyhow::Result<Config> {
    let file = match &args.config {
        Some(path) => Some(reconctl_config::file::FileConfig::load(path).context("loading --config file")?),
        None => None,
    };
    let mut builder = ConfigBuilder::new(args);
    if let Some(file) = file {
        builder = builder.with_file(file);
    }
    builder.build().context("building effective configuration")
}

async fn run_recon(mut args: RunArgs, force_resume: bool) -> anyhow::Result<i32> {
    if force_resume {
        args.resume = true;
    }
    let config = Arc::new(build_config(args)?);

    let prepared = reconctl_engine::prepare(&config).await.context("preparing run directory")?;

    // Logging starts here, once `run_root` is known, so `scan.log` lives
    // next to every other artifact rather than in an ambient cwd location.
    // Anything logged during `prepare` (e.g. a DNS-lookup warning) is lost
    // before the subscriber exists — an accepted tradeoff; see DESIGN.md.
    let scan_log = prepared.run_root.join(reconctl_store::layout::SCAN_LOG);
    logging::init(config.log_format, Some(&scan_log))?;

    tracing::info!(
        target = %config.targets.first().map(|t| t.fqdn().to_string()).unwrap_or_default(),
        run_root = %prepared.run_root,
        "starting run"
    );

    let cancellation = Cancellation::new();
    {
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("received interrupt signal; stopping after the current stage batch");
                cancellation.cancel();
            }
        });
    }

    let outcome = reconctl_engine::execute_prepared(prepared, config.clone(), cancellation)
        .await
        .context("executing pipeline")?;

    notify_webhook(&config, &outcome.run_root).await;

    let failed = reconctl_report::has_failed_stage(&outcome.stage_log);
    println!("run {} complete: {}", outcome.run_id, outcome.run_root);

    if config.strict && failed {
        tracing::error!("run failed in strict mode: at least one stage reached FAILED");
        Ok(reconctl_utils::exit_codes::STAGE_FAILED_STRICT)
    } else {
        Ok(reconctl_utils::exit_codes::SUCCESS)
    }
}

async fn notify_webhook(config: &Config, run_root: &Utf8PathBuf) {
    let Some(url) = &config.webhook else { return };
    let summary_path = run_root.join(reconctl_store::layout::SUMMARY_JSON);
    let summary_text = match std::fs::read_to_string(summary_path.as_std_path()) {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(error = %err, "could not read summary.json for webhook delivery");
            return;
        }
    };
    let summary_json: serde_json::Value = match serde_json::from_str(&summary_text) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "summary.json was not valid JSON; skipping webhook");
            return;
        }
    };
    let notifier = reconctl_webhook::HttpNotifier::new(url.clone());
    reconctl_webhook::notify_best_effort(&notifier, &summary_json).await;
}

/// Inspects the root cause of a failed dispatch to decide which of the four
/// fixed exit codes applies (spec §10.2). Unrecognized causes fall back to
/// `FATAL_INTERNAL` rather than `INVALID_INVOCATION` — an invocation error
/// must be identifiable, not assumed.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<reconctl_config::ConfigError>().is_some() {
        return reconctl_utils::exit_codes::INVALID_INVOCATION;
    }
    if let Some(engine_err) = err.downcast_ref::<reconctl_engine::EngineError>() {
        return match engine_err {
            reconctl_engine::EngineError::Target(_) | reconctl_engine::EngineError::Resume(_) => reconctl_utils::exit_codes::INVALID_INVOCATION,
            reconctl_engine::EngineError::State(state_err) => match state_err {
                reconctl_state::StateError::TargetMismatch { .. } | reconctl_state::StateError::ConfigMismatch { .. } => {
                    reconctl_utils::exit_codes::INVALID_INVOCATION
                }
                _ => reconctl_utils::exit_codes::FATAL_INTERNAL,
            },
            _ => reconctl_utils::exit_codes::FATAL_INTERNAL,
        };
    }
    reconctl_utils::exit_codes::FATAL_INTERNAL
}
