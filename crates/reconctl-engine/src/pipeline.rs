//! Pipeline Engine: builds the Stage DAG from each [`Stage`]'s declared
//! `depends_on`/`soft_depends_on` and fans every independent Stage out
//! concurrently, subject only to the Governor (spec §2.9, §4.6, §5).
//!
//! There is no separate "DAG object" — dependency order falls directly out
//! of one `tokio::sync::watch` channel per Stage. A Stage's task waits on
//! its dependencies' channels, decides whether it may run at all, then
//! calls [`Stage::run`] and publishes its own terminal state for whoever
//! depends on it. Two Stages that share no dependency path therefore start
//! as soon as their own deps resolve, with no barrier between unrelated
//! branches of the DAG (spec §5: "Within independent sets, order is
//! nondeterministic").

use camino::{Utf8Path, Utf8PathBuf};
use reconctl_registry::ToolLocation;
use reconctl_stage::stage_log::{StageRecord, TerminalState};
use reconctl_stage::{RunContext, Stage, StageOutcome};
use reconctl_state::{Journal, RecordedState};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex as AsyncMutex};

/// Stages already satisfied by a prior run's State Journal (spec §4.8):
/// the engine must not call [`Stage::run`] for these at all, so a
/// `--resume` that changes nothing spawns zero new Process Runner
/// invocations (spec §8 property 5, scenario S6).
pub type AlreadyOk = HashSet<String>;

fn missing_required_tools(ctx: &RunContext, stage: &dyn Stage) -> Option<String> {
    let missing: Vec<&str> = stage
        .required_tools()
        .iter()
        .filter(|tool| matches!(ctx.registry.locate(tool), ToolLocation::NotInstalled))
        .copied()
        .collect();
    if missing.is_empty() {
        None
    } else {
        Some(missing.join(", "))
    }
}

async fn wait_for_terminal(rx: &mut watch::Receiver<Option<TerminalState>>) -> TerminalState {
    loop {
        if let Some(state) = *rx.borrow() {
            return state;
        }
        if rx.changed().await.is_err() {
            // The publishing task was dropped without ever sending — this
            // only happens on a panic inside that task, which we treat as
            // a dependency failure rather than hanging forever.
            return TerminalState::Failed;
        }
    }
}

fn terminal_state_of(outcome: &StageOutcome) -> TerminalState {
    match outcome {
        StageOutcome::Ok { .. } => TerminalState::Ok,
        StageOutcome::Skipped { .. } => TerminalState::Skipped,
        StageOutcome::Failed { .. } => TerminalState::Failed,
    }
}

fn reason_of(outcome: &StageOutcome) -> Option<String> {
    match outcome {
        StageOutcome::Ok { .. } => None,
        StageOutcome::Skipped { reason } => Some(reason.clone()),
        StageOutcome::Failed { error } => Some(error.clone()),
    }
}

fn recorded_state_of(state: TerminalState) -> RecordedState {
    match state {
        TerminalState::Ok => RecordedState::Ok,
        TerminalState::Skipped => RecordedState::Skipped,
        TerminalState::Failed => RecordedState::Failed,
    }
}

/// Persist `journal` to `.state.json` under `run_root`.
fn persist_journal(run_root: &Utf8Path, journal: &Journal) {
    let path = run_root.join(reconctl_store::layout::STATE_JOURNAL);
    if let Err(err) = journal.write(&path) {
        tracing::error!(error = %err, "failed to persist state journal");
    }
}

/// Execute every Stage in `stages` that isn't already satisfied by
/// `already_ok`, honoring each Stage's declared dependencies, and return
/// the full terminal-state log for the Run (spec §4.7 `scan_info.stages`).
pub async fn execute(
    ctx: &RunContext,
    stages: &[Arc<dyn Stage>],
    already_ok: &AlreadyOk,
    journal: Arc<AsyncMutex<Journal>>,
) -> Vec<StageRecord> {
    let mut senders: HashMap<&'static str, watch::Sender<Option<TerminalState>>> = HashMap::new();
    let mut receivers: HashMap<&'static str, watch::Receiver<Option<TerminalState>>> = HashMap::new();
    for stage in stages {
        let (tx, rx) = watch::channel(None);
        senders.insert(stage.name(), tx);
        receivers.insert(stage.name(), rx);
    }

    // Seed every already-OK stage immediately: its dependents must not
    // wait on a task that will never be spawned.
    for stage in stages {
        if already_ok.contains(stage.name()) {
            let duration_ms = journal
                .try_lock()
                .ok()
                .and_then(|j| j.entry(stage.name()).map(|e| e.duration_ms))
                .unwrap_or(0);
            ctx.stage_log.record(StageRecord {
                name: stage.name().to_string(),
                state: TerminalState::Ok,
                reason: None,
                duration_ms,
            });
            let _ = senders[stage.name()].send(Some(TerminalState::Ok));
        }
    }

    let mut handles = Vec::new();
    for stage in stages {
        if already_ok.contains(stage.name()) {
            continue;
        }

        let stage = stage.clone();
        let ctx = ctx.clone();
        let journal = journal.clone();
        let run_root: Utf8PathBuf = ctx.store.run_root().to_path_buf();

        let hard_deps: Vec<(&'static str, watch::Receiver<Option<TerminalState>>)> =
            stage.depends_on().iter().map(|name| (*name, receivers[name].clone())).collect();
        let soft_deps: Vec<watch::Receiver<Option<TerminalState>>> =
            stage.soft_depends_on().iter().map(|name| receivers[name].clone()).collect();
        let tx = senders[stage.name()].clone();

        handles.push(tokio::spawn(async move {
            let mut unmet_dependency = None;
            for (name, mut rx) in hard_deps {
                if wait_for_terminal(&mut rx).await != TerminalState::Ok && unmet_dependency.is_none() {
                    unmet_dependency = Some(name);
                }
            }
            for mut rx in soft_deps {
                wait_for_terminal(&mut rx).await;
            }

            let start = Instant::now();
            let outcome = if ctx.cancellation.is_cancelled() {
                StageOutcome::skipped("cancelled")
            } else if let Some(dep) = unmet_dependency {
                StageOutcome::skipped(format!("dependency {dep} did not complete OK"))
            } else if let Some(missing) = missing_required_tools(&ctx, stage.as_ref()) {
                StageOutcome::skipped(format!("missing required tool(s): {missing}"))
            } else {
                {
                    let mut journal = journal.lock().await;
                    journal.record(stage.name(), RecordedState::Running, None, 0);
                }
                stage.run(&ctx).await
            };
            let duration_ms = start.elapsed().as_millis() as u64;
            let terminal = terminal_state_of(&outcome);
            let reason = reason_of(&outcome);

            match terminal {
                TerminalState::Skipped => {
                    tracing::warn!(stage = stage.name(), reason = reason.as_deref().unwrap_or(""), "stage skipped");
                }
                TerminalState::Failed => {
                    tracing::error!(stage = stage.name(), reason = reason.as_deref().unwrap_or(""), "stage failed");
                }
                TerminalState::Ok => {
                    tracing::info!(stage = stage.name(), duration_ms, "stage completed");
                }
            }

            ctx.stage_log.record(StageRecord {
                name: stage.name().to_string(),
                state: terminal,
                reason: reason.clone(),
                duration_ms,
            });

            {
                let mut journal = journal.lock().await;
                journal.record(stage.name(), recorded_state_of(terminal), reason, duration_ms);
                persist_journal(&run_root, &journal);
            }

            let _ = tx.send(Some(terminal));
        }));
    }

    for handle in handles {
        let _ = handle.await;
    }

    ctx.stage_log.snapshot()
}
