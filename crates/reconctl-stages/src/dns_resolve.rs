//! `dns_resolve`: resolves every host in `subdomains/all.txt` and writes
//! both a structured `subdomains/resolved.json` (host -> addresses) and a
//! plain `subdomains/live.txt` (hosts that resolved to at least one
//! address), the latter being what `probe_http` reads (spec §4.6).
//!
//! Prefers `dnsx` when installed (fast, supports wildcard filtering); falls
//! back to the system resolver otherwise. Either way each lookup goes
//! through a Governor permit, same as every other fan-out Stage.

use crate::common::read_lines;
use async_trait::async_trait;
use reconctl_registry::ToolLocation;
use reconctl_stage::{RunContext, Stage, StageOutcome};
use reconctl_store::{layout, ArtifactId};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
struct ResolvedHost {
    host: String,
    addresses: Vec<String>,
}

async fn resolve_system(ctx: &RunContext, host: String) -> ResolvedHost {
    let addresses = match ctx.acquire_permit().await {
        Some(_permit) => tokio::net::lookup_host((host.as_str(), 0))
            .await
            .map(|addrs| addrs.map(|a| a.ip().to_string()).collect())
            .unwrap_or_default(),
        None => Vec::new(),
    };
    ResolvedHost { host, addresses }
}

fn parse_dnsx_line(line: &str) -> Option<ResolvedHost> {
    // dnsx -silent -a output: "host.example.com [1.2.3.4,1.2.3.5]"
    let (host, rest) = line.split_once(' ')?;
    let addrs = rest.trim().trim_start_matches('[').trim_end_matches(']');
    let addresses = addrs.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();
    Some(ResolvedHost {
        host: host.trim().to_ascii_lowercase(),
        addresses,
    })
}

pub struct DnsResolve;

#[async_trait]
impl Stage for DnsResolve {
    fn name(&self) -> &'static str {
        "dns_resolve"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["merge_subdomains"]
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let hosts = read_lines(ctx, layout::SUBDOMAINS_ALL);
        if hosts.is_empty() {
            return StageOutcome::skipped("no subdomains to resolve");
        }

        let mut resolved: BTreeMap<String, ResolvedHost> = BTreeMap::new();

        match ctx.registry.locate("dnsx") {
            ToolLocation::Absolute(_) => {
                let deadline = ctx.config.stage_timeout(self.name());
                let input = hosts.join("\n");
                let Some(mut spec) = crate::common::locate_and_build(ctx, "dnsx", &["-silent".to_string(), "-a".to_string(), "-resp".to_string()], deadline)
                else {
                    return StageOutcome::failed("dnsx vanished between locate and build");
                };
                spec = spec.with_stdin(input.into_bytes());
                match crate::common::invoke(ctx, &spec).await {
                    Ok(Some(result)) => {
                        for line in result.stdout_string().lines() {
                            if let Some(rh) = parse_dnsx_line(line) {
                                resolved.insert(rh.host.clone(), rh);
                            }
                        }
                    }
                    Ok(None) => return StageOutcome::skipped("cancelled"),
                    Err(err) => {
                        tracing::warn!(stage = self.name(), error = %err, "dnsx invocation failed; falling back to system resolver");
                    }
                }
            }
            ToolLocation::NotInstalled => {}
        }

        let unresolved: Vec<String> = hosts.into_iter().filter(|h| !resolved.contains_key(h)).collect();
        if !unresolved.is_empty() {
            if resolved.is_empty() {
                tracing::info!(stage = self.name(), "dnsx not installed; resolving via system resolver");
            }
            for host in unresolved {
                let rh = resolve_system(ctx, host).await;
                resolved.insert(rh.host.clone(), rh);
            }
        }

        let live: Vec<String> = resolved
            .values()
            .filter(|rh| !rh.addresses.is_empty())
            .map(|rh| rh.host.clone())
            .collect();
        let resolved_list: Vec<&ResolvedHost> = resolved.values().collect();

        let resolved_artifact = match ctx.store.write_json(
            ArtifactId::new(self.name(), "resolved.json"),
            layout::SUBDOMAINS_RESOLVED,
            &resolved_list,
        ) {
            Ok(artifact) => artifact,
            Err(err) => return StageOutcome::failed(format!("writing {}: {err}", layout::SUBDOMAINS_RESOLVED)),
        };

        let live_artifact = match ctx.store.write_lines(ArtifactId::new(self.name(), "live.txt"), layout::SUBDOMAINS_LIVE, &live) {
            Ok(artifact) => artifact,
            Err(err) => return StageOutcome::failed(format!("writing {}: {err}", layout::SUBDOMAINS_LIVE)),
        };

        StageOutcome::ok(vec![
            ArtifactId::new(resolved_artifact.id_stage, resolved_artifact.id_name),
            ArtifactId::new(live_artifact.id_stage, live_artifact.id_name),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;
    use reconctl_runner::stub::ScriptedResponse;

    #[tokio::test]
    async fn skipped_when_no_subdomains() {
        let (_dir, ctx, _tools) = test_context(&["example.com"]).await;
        let outcome = DnsResolve.run(&ctx).await;
        assert!(matches!(outcome, StageOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn uses_dnsx_output_when_installed() {
        let (_dir, ctx, tools) = test_context(&["example.com"]).await;
        ctx.store
            .write_lines(
                ArtifactId::new("merge_subdomains", "all.txt"),
                layout::SUBDOMAINS_ALL,
                &["api.example.com".into()],
            )
            .unwrap();
        tools.install("dnsx");
        tools.stub().script(ScriptedResponse::ok("dnsx", "api.example.com [1.2.3.4]\n"));

        let outcome = DnsResolve.run(&ctx).await;
        assert!(outcome.is_ok());
        let live = std::fs::read_to_string(ctx.store.run_root().join(layout::SUBDOMAINS_LIVE)).unwrap();
        assert_eq!(live, "api.example.com\n");
    }

    #[test]
    fn parses_dnsx_bracketed_address_list() {
        let rh = parse_dnsx_line("API.Example.com [1.2.3.4,1.2.3.5]").unwrap();
        assert_eq!(rh.host, "api.example.com");
        assert_eq!(rh.addresses, vec!["1.2.3.4", "1.2.3.5"]);
    }
}
