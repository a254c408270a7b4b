//! `port_scan`: `nmap` top-1000-port scan over resolved hosts, writing
//! `nmap/<host>.txt` per host (spec §4.6). Capped at
//! `Config::port_scan_host_cap` hosts (default 5) — port scanning is the
//! noisiest Stage in the catalog, so the cap is tighter than `dir_fuzz`'s.

use crate::common::BreakerOutcome;
use async_trait::async_trait;
use reconctl_registry::ToolLocation;
use reconctl_stage::{RunContext, Stage, StageOutcome};
use reconctl_store::{layout, ArtifactId};

pub struct PortScan;

#[async_trait]
impl Stage for PortScan {
    fn name(&self) -> &'static str {
        "port_scan"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["dns_resolve"]
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let mut hosts = crate::common::read_lines(ctx, layout::SUBDOMAINS_LIVE);
        if hosts.is_empty() {
            return StageOutcome::skipped("no live hosts to scan");
        }

        let cap = ctx.config.port_scan_host_cap;
        if hosts.len() > cap {
            tracing::warn!(stage = self.name(), dropped = hosts.len() - cap, cap, "host cap reached; extra hosts skipped");
            hosts.truncate(cap);
        }

        let ToolLocation::Absolute(_) = ctx.registry.locate("nmap") else {
            return StageOutcome::skipped("nmap is not installed");
        };

        let deadline = ctx.config.stage_timeout(self.name());
        let mut artifacts = Vec::new();

        for host in &hosts {
            let args = vec!["--top-ports".to_string(), "1000".to_string(), "-Pn".to_string(), host.clone()];
            let Some(spec) = crate::common::locate_and_build(ctx, "nmap", &args, deadline) else {
                continue;
            };

            match crate::common::invoke_with_breaker(ctx, host, &spec).await {
                Ok(BreakerOutcome::Ran(result)) => {
                    let id = ArtifactId::new(self.name(), host.clone());
                    match ctx.store.write_text(id.clone(), layout::nmap(host), &result.stdout_string()) {
                        Ok(artifact) => artifacts.push(ArtifactId::new(artifact.id_stage, artifact.id_name)),
                        Err(err) => tracing::warn!(stage = self.name(), host = %host, error = %err, "failed to persist nmap output"),
                    }
                }
                Ok(BreakerOutcome::CircuitOpen) => tracing::warn!(stage = self.name(), host = %host, "circuit open; skipped scan"),
                Ok(BreakerOutcome::Cancelled) => return StageOutcome::skipped("cancelled"),
                Err(err) => tracing::warn!(stage = self.name(), host = %host, error = %err, "nmap invocation failed"),
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
    async fn writes_nmap_output_per_host() {
        let (_dir, ctx, tools) = test_context(&["example.com"]).await;
        ctx.store
            .write_lines(ArtifactId::new("dns_resolve", "live.txt"), layout::SUBDOMAINS_LIVE, &["api.example.com".into()])
            .unwrap();
        tools.install("nmap");
        tools.stub().script(ScriptedResponse::ok("nmap", "22/tcp open ssh\n443/tcp open https\n"));

        let outcome = PortScan.run(&ctx).await;
        assert!(outcome.is_ok());
        let content = std::fs::read_to_string(ctx.store.run_root().join(layout::nmap("api.example.com"))).unwrap();
        assert!(content.contains("443/tcp open https"));
    }

    #[tokio::test]
    async fn caps_host_count() {
        let (_dir, ctx, tools) = test_context(&["example.com"]).await;
        ctx.store
            .write_lines(
                ArtifactId::new("dns_resolve", "live.txt"),
                layout::SUBDOMAINS_LIVE,
                &(0..8).map(|i| format!("h{i}.example.com")).collect::<Vec<_>>(),
            )
            .unwrap();
        tools.install("nmap");
        for _ in 0..5 {
            tools.stub().script(ScriptedResponse::ok("nmap", "22/tcp open ssh\n"));
        }

        let outcome = PortScan.run(&ctx).await;
        assert!(outcome.is_ok());
        assert_eq!(tools.stub().invocations_for("nmap"), 5);
    }
}
