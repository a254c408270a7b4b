//! `dir_fuzz`: directory/file brute force via `ffuf` over the live host
//! set, writing `endpoints/dirs/<host>.json` per host (spec §4.6). Capped
//! at `Config::dir_fuzz_host_cap` hosts (default 10); each host subject to
//! the per-host Circuit Breaker.

use crate::common::BreakerOutcome;
use async_trait::async_trait;
use reconctl_registry::ToolLocation;
use reconctl_stage::{RunContext, Stage, StageOutcome};
use reconctl_store::{layout, ArtifactId};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct DirFuzzResult {
    host: String,
    paths: Vec<String>,
}

pub struct DirFuzz;

#[async_trait]
impl Stage for DirFuzz {
    fn name(&self) -> &'static str {
        "dir_fuzz"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["probe_http"]
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let mut hosts = crate::common::read_lines(ctx, layout::SUBDOMAINS_LIVE);
        if hosts.is_empty() {
            return StageOutcome::skipped("no live hosts to fuzz");
        }

        let cap = ctx.config.dir_fuzz_host_cap;
        if hosts.len() > cap {
            tracing::warn!(stage = self.name(), dropped = hosts.len() - cap, cap, "host cap reached; extra hosts skipped");
            hosts.truncate(cap);
        }

        let ToolLocation::Absolute(_) = ctx.registry.locate("ffuf") else {
            return StageOutcome::skipped("ffuf is not installed");
        };

        let deadline = ctx.config.stage_timeout(self.name());
        let wordlist = ctx.config.wordlist.as_ref().map(|p| p.to_string()).unwrap_or_else(|| "/dev/null".to_string());
        let mut artifacts = Vec::new();

        for host in &hosts {
            let url = format!("https://{host}/FUZZ");
            let args = vec!["-u".to_string(), url, "-w".to_string(), wordlist.clone(), "-mc".to_string(), "200,301,302,403".to_string()];
            let Some(spec) = crate::common::locate_and_build(ctx, "ffuf", &args, deadline) else {
                continue;
            };

            match crate::common::invoke_with_breaker(ctx, host, &spec).await {
                Ok(BreakerOutcome::Ran(result)) => {
                    let paths: Vec<String> = result.stdout_string().lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect();
                    let record = DirFuzzResult { host: host.clone(), paths };
                    let id = ArtifactId::new(self.name(), host.clone());
                    match ctx.store.write_json(id.clone(), layout::dir_fuzz(host), &record) {
                        Ok(artifact) => artifacts.push(ArtifactId::new(artifact.id_stage, artifact.id_name)),
                        Err(err) => tracing::warn!(stage = self.name(), host = %host, error = %err, "failed to persist dir_fuzz result"),
                    }
                }
                Ok(BreakerOutcome::CircuitOpen) => tracing::warn!(stage = self.name(), host = %host, "circuit open; skipped fuzzing"),
                Ok(BreakerOutcome::Cancelled) => return StageOutcome::skipped("cancelled"),
                Err(err) => tracing::warn!(stage = self.name(), host = %host, error = %err, "ffuf invocation failed"),
            }
        }

        StageOutcome::ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;
    use reconctl_runner::stub::ScriptedResponse;

    #[tokio::test]
    async fn writes_one_artifact_per_host() {
        let (_dir, ctx, tools) = test_context(&["example.com"]).await;
        ctx.store
            .write_lines(
                ArtifactId::new("dns_resolve", "live.txt"),
                layout::SUBDOMAINS_LIVE,
                &["api.example.com".into(), "www.example.com".into()],
            )
            .unwrap();
        tools.install("ffuf");
        tools.stub().script(ScriptedResponse::ok("ffuf", "/admin\n/api\n"));
        tools.stub().script(ScriptedResponse::ok("ffuf", "/login\n"));

        let outcome = DirFuzz.run(&ctx).await;
        assert!(outcome.is_ok());
        assert!(ctx.store.run_root().join(layout::dir_fuzz("api.example.com")).exists());
        assert!(ctx.store.run_root().join(layout::dir_fuzz("www.example.com")).exists());
    }

    #[tokio::test]
    async fn skipped_when_ffuf_not_installed() {
        let (_dir, ctx, _tools) = test_context(&["example.com"]).await;
        ctx.store
            .write_lines(ArtifactId::new("dns_resolve", "live.txt"), layout::SUBDOMAINS_LIVE, &["api.example.com".into()])
            .unwrap();
        let outcome = DirFuzz.run(&ctx).await;
        assert!(matches!(outcome, StageOutcome::Skipped { .. }));
    }
}
