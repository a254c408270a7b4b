//! `screenshot`: one `gowitness` invocation per live host, writing
//! `screenshots/<host>.png` (spec §4.6). Chunked by host rather than one
//! batch call so a single host's capture failure can't blank out the rest
//! ("failure per-host does not fail the stage"), and so the per-host
//! Circuit Breaker applies the same as every other per-host fan-out Stage.
//!
//! Invoked in single-shot mode with PNG bytes written to stdout rather than
//! to a file gowitness manages itself, so capture goes through the same
//! Process Runner stdout path every other Stage uses instead of a second,
//! file-adoption code path.

use crate::common::BreakerOutcome;
use async_trait::async_trait;
use reconctl_registry::ToolLocation;
use reconctl_stage::{RunContext, Stage, StageOutcome};
use reconctl_store::{layout, ArtifactId};

pub struct Screenshot;

#[async_trait]
impl Stage for Screenshot {
    fn name(&self) -> &'static str {
        "screenshot"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["probe_http"]
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let hosts = crate::common::read_lines(ctx, layout::SUBDOMAINS_LIVE);
        if hosts.is_empty() {
            return StageOutcome::skipped("no live hosts to screenshot");
        }

        let ToolLocation::Absolute(_) = ctx.registry.locate("gowitness") else {
            return StageOutcome::skipped("gowitness is not installed");
        };

        let deadline = ctx.config.stage_timeout(self.name());
        let mut artifacts = Vec::new();
        let mut captured = 0usize;

        for host in &hosts {
            let url = format!("https://{host}");
            let Some(spec) = crate::common::locate_and_build(
                ctx,
                "gowitness",
                &["single".to_string(), "--url".to_string(), url, "--format".to_string(), "stdout-png".to_string()],
                deadline,
            ) else {
                continue;
            };

            match crate::common::invoke_with_breaker(ctx, host, &spec).await {
                Ok(BreakerOutcome::Ran(result)) if !result.stdout_bytes().is_empty() => {
                    let id = ArtifactId::new(self.name(), host.clone());
                    match ctx.store.write_bytes(id.clone(), layout::screenshot(host), result.stdout_bytes()) {
                        Ok(artifact) => {
                            artifacts.push(ArtifactId::new(artifact.id_stage, artifact.id_name));
                            captured += 1;
                        }
                        Err(err) => tracing::warn!(stage = self.name(), host = %host, error = %err, "failed to persist screenshot"),
                    }
                }
                Ok(BreakerOutcome::Ran(_)) => {
                    tracing::warn!(stage = self.name(), host = %host, "gowitness produced no image data");
                }
                Ok(BreakerOutcome::CircuitOpen) => {
                    tracing::warn!(stage = self.name(), host = %host, "circuit open; skipped screenshot");
                }
                Ok(BreakerOutcome::Cancelled) => return StageOutcome::skipped("cancelled"),
                Err(err) => {
                    tracing::warn!(stage = self.name(), host = %host, error = %err, "gowitness invocation failed");
                }
            }
        }

        tracing::info!(stage = self.name(), captured, total = hosts.len(), "screenshot capture complete");
        StageOutcome::ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;
    use reconctl_runner::stub::ScriptedResponse;

    #[tokio::test]
    async fn skipped_when_no_live_hosts() {
        let (_dir, ctx, _tools) = test_context(&["example.com"]).await;
        let outcome = Screenshot.run(&ctx).await;
        assert!(matches!(outcome, StageOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn one_host_failure_does_not_fail_the_stage() {
        let (_dir, ctx, tools) = test_context(&["example.com"]).await;
        ctx.store
            .write_lines(
                ArtifactId::new("dns_resolve", "live.txt"),
                layout::SUBDOMAINS_LIVE,
                &["ok.example.com".into(), "bad.example.com".into()],
            )
            .unwrap();
        tools.install("gowitness");
        tools.stub().script(ScriptedResponse::ok("gowitness", b"\x89PNG-fake-bytes".to_vec()));
        tools.stub().script(ScriptedResponse::failing("gowitness", 1, "connection refused"));

        let outcome = Screenshot.run(&ctx).await;
        assert!(outcome.is_ok());
        assert!(ctx
            .store
            .run_root()
            .join(layout::screenshot("ok.example.com"))
            .exists());
    }
}
