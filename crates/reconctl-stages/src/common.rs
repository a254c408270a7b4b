//! Shared helpers used by several Stage implementations: tool invocation
//! through the Governor, environment filtering, host-list reading, and
//! basic FQDN validation for discovered names.

use reconctl_governor::Admission;
use reconctl_registry::ToolLocation;
use reconctl_runner::{CommandSpec, InvocationResult, RunnerError};
use reconctl_stage::RunContext;
use std::path::PathBuf;
use std::time::Duration;

/// The filtered-minimum child environment (spec §4.4): `PATH`, `HOME`, and
/// whatever the config explicitly whitelists. Never the full ambient
/// environment.
pub fn minimal_env(ctx: &RunContext) -> Vec<(String, String)> {
    let mut env = Vec::new();
    if let Ok(path) = std::env::var("PATH") {
        env.push(("PATH".to_string(), path));
    }
    if let Ok(home) = std::env::var("HOME") {
        env.push(("HOME".to_string(), home));
    }
    for key in &ctx.config.env_whitelist {
        if let Ok(value) = std::env::var(key) {
            env.push((key.clone(), value));
        }
    }
    env
}

/// Resolve `tool` via the registry and build an argv-only [`CommandSpec`].
/// Returns `None` if the tool is not installed — callers treat that as a
/// `ToolMissing` condition for the specific invocation, not necessarily the
/// whole Stage.
pub fn locate_and_build(ctx: &RunContext, tool: &str, args: &[String], deadline: Duration) -> Option<CommandSpec> {
    match ctx.registry.locate(tool) {
        ToolLocation::Absolute(path) => {
            let mut argv = vec![path.to_string()];
            argv.extend(args.iter().cloned());
            let cwd: PathBuf = ctx.store.run_root().as_std_path().to_path_buf();
            Some(CommandSpec::new(argv, cwd, deadline).with_env(minimal_env(ctx)))
        }
        ToolLocation::NotInstalled => None,
    }
}

/// Acquire a Governor permit (honoring cancellation) and run `spec`. Returns
/// `Ok(None)` if cancellation fired before a permit was acquired.
pub async fn invoke(ctx: &RunContext, spec: &CommandSpec) -> Result<Option<InvocationResult>, RunnerError> {
    let Some(_permit) = ctx.acquire_permit().await else {
        return Ok(None);
    };
    ctx.runner.run(spec).await.map(Some)
}

/// Whether an [`InvocationResult`] should count against a target's Circuit
/// Breaker: timeouts and nonzero exits are treated uniformly, since the
/// generic process-exit-code model doesn't carry HTTP semantics for tools
/// that don't emit structured output.
pub fn is_breaker_failure(result: &InvocationResult) -> bool {
    result.timed_out || result.exit_code.map(|c| c != 0).unwrap_or(true)
}

/// Runs an invocation against `host` through the per-host Circuit Breaker:
/// skips entirely (returning `None`) if the breaker denies admission,
/// otherwise invokes and updates the breaker from the outcome.
pub async fn invoke_with_breaker(
    ctx: &RunContext,
    host: &str,
    spec: &CommandSpec,
) -> Result<BreakerOutcome, RunnerError> {
    let breaker = ctx.breakers.get_or_create(host);
    match breaker.admit() {
        Admission::CircuitOpen => Ok(BreakerOutcome::CircuitOpen),
        Admission::Allowed | Admission::Probe => {
            let Some(result) = invoke(ctx, spec).await? else {
                return Ok(BreakerOutcome::Cancelled);
            };
            if is_breaker_failure(&result) {
                breaker.record_failure();
            } else {
                breaker.record_success();
            }
            Ok(BreakerOutcome::Ran(result))
        }
    }
}

pub enum BreakerOutcome {
    Ran(InvocationResult),
    CircuitOpen,
    Cancelled,
}

/// RFC 1035-ish shape check for a discovered hostname: dot-separated
/// alphanumeric-and-hyphen labels, no empty labels, no leading/trailing
/// hyphen in a label.
pub fn is_valid_fqdn(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 {
        return false;
    }
    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            && !label.starts_with('-')
            && !label.ends_with('-')
    })
}

/// Read a text artifact at a run-root-relative path into non-empty,
/// trimmed lines. Returns an empty vec if the file doesn't exist yet (a
/// dependency stage that was SKIPPED and produced nothing).
pub fn read_lines(ctx: &RunContext, rel_path: &str) -> Vec<String> {
    let Ok(sandbox_path) = ctx.store.resolve(rel_path) else {
        return Vec::new();
    };
    std::fs::read_to_string(sandbox_path.as_path().as_std_path())
        .map(|content| {
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Sorted, deduplicated union of several line lists — the merge operation
/// every fan-out enumeration Stage uses, which must be commutative and
/// idempotent regardless of tool completion order (spec §8 property 9).
pub fn sorted_unique_union(lists: impl IntoIterator<Item = Vec<String>>) -> Vec<String> {
    let mut set = std::collections::BTreeSet::new();
    for list in lists {
        for item in list {
            set.insert(item);
        }
    }
    set.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_unique_union_is_commutative() {
        let a = vec!["foo.example.com".to_string(), "bar.example.com".to_string()];
        let b = vec!["bar.example.com".to_string(), "baz.example.com".to_string()];
        let forward = sorted_unique_union([a.clone(), b.clone()]);
        let backward = sorted_unique_union([b, a]);
        assert_eq!(forward, backward);
        assert_eq!(forward, vec!["bar.example.com", "baz.example.com", "foo.example.com"]);
    }

    #[test]
    fn is_valid_fqdn_rejects_empty_labels_and_bad_chars() {
        assert!(is_valid_fqdn("api.example.com"));
        assert!(!is_valid_fqdn(""));
        assert!(!is_valid_fqdn("api..example.com"));
        assert!(!is_valid_fqdn("-api.example.com"));
        assert!(!is_valid_fqdn("api_underscore.example.com".replace('_', "!").as_str()));
    }
}
