//! `takeover_check`: subdomain takeover detection over the live host set,
//! writing `vulns/takeovers.json` and surfacing a high-severity
//! [`reconctl_stage::Finding`] for each vulnerable host (spec §4.6: "Any
//! finding of severity >= high is flagged in the report").
//!
//! Prefers `subzy` (purpose-built, one host per invocation — convenient for
//! the per-host Circuit Breaker); falls back to `nuclei`'s takeover template
//! set run once over the whole host list when `subzy` isn't installed.

use crate::common::BreakerOutcome;
use async_trait::async_trait;
use reconctl_registry::ToolLocation;
use reconctl_stage::{Finding, RunContext, Severity, Stage, StageOutcome};
use reconctl_store::{layout, ArtifactId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TakeoverRecord {
    host: String,
    vulnerable: bool,
    #[serde(default)]
    fingerprint: Option<String>,
}

async fn check_with_subzy(ctx: &RunContext, hosts: &[String], deadline: std::time::Duration) -> Vec<TakeoverRecord> {
    let mut records = Vec::new();
    for host in hosts {
        let Some(spec) = crate::common::locate_and_build(
            ctx,
            "subzy",
            &["run".to_string(), "--target".to_string(), host.clone(), "--output".to_string(), "json".to_string()],
            deadline,
        ) else {
            continue;
        };
        match crate::common::invoke_with_breaker(ctx, host, &spec).await {
            Ok(BreakerOutcome::Ran(result)) => {
                if let Some(record) = result.stdout_string().lines().find_map(|l| serde_json::from_str::<TakeoverRecord>(l).ok()) {
                    records.push(record);
                } else {
                    records.push(TakeoverRecord {
                        host: host.clone(),
                        vulnerable: false,
                        fingerprint: None,
                    });
                }
            }
            Ok(BreakerOutcome::CircuitOpen) | Ok(BreakerOutcome::Cancelled) => {}
            Err(err) => tracing::warn!(stage = "takeover_check", host = %host, error = %err, "subzy invocation failed"),
        }
    }
    records
}

pub struct TakeoverCheck;

#[async_trait]
impl Stage for TakeoverCheck {
    fn name(&self) -> &'static str {
        "takeover_check"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["probe_http"]
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let hosts = crate::common::read_lines(ctx, layout::SUBDOMAINS_LIVE);
        if hosts.is_empty() {
            return StageOutcome::skipped("no live hosts to check");
        }

        let deadline = ctx.config.stage_timeout(self.name());
        let records = match ctx.registry.locate("subzy") {
            ToolLocation::Absolute(_) => check_with_subzy(ctx, &hosts, deadline).await,
            ToolLocation::NotInstalled => match ctx.registry.locate("nuclei") {
                ToolLocation::Absolute(_) => {
                    let mut args = vec!["-silent".to_string(), "-jsonl".to_string(), "-tags".to_string(), "takeover".to_string()];
                    for host in &hosts {
                        args.push("-u".to_string());
                        args.push(format!("https://{host}"));
                    }
                    let Some(spec) = crate::common::locate_and_build(ctx, "nuclei", &args, deadline) else {
                        return StageOutcome::failed("nuclei vanished between locate and build");
                    };
                    match crate::common::invoke(ctx, &spec).await {
                        Ok(Some(result)) => result
                            .stdout_string()
                            .lines()
                            .filter_map(|l| serde_json::from_str::<TakeoverRecord>(l).ok())
                            .collect(),
                        Ok(None) => return StageOutcome::skipped("cancelled"),
                        Err(err) => return StageOutcome::failed(format!("nuclei invocation failed: {err}")),
                    }
                }
                ToolLocation::NotInstalled => return StageOutcome::skipped("neither subzy nor nuclei is installed"),
            },
        };

        let findings: Vec<Finding> = records
            .iter()
            .filter(|r| r.vulnerable)
            .map(|r| {
                Finding::new(
                    Severity::High,
                    "subdomain_takeover",
                    r.host.clone(),
                    self.name(),
                    format!("{} appears takeover-vulnerable ({})", r.host, r.fingerprint.as_deref().unwrap_or("unknown provider")),
                    &ctx.redactor,
                )
            })
            .collect();

        let artifact = match ctx.store.write_json(ArtifactId::new(self.name(), "takeovers.json"), layout::VULNS_TAKEOVERS, &records) {
            Ok(artifact) => artifact,
            Err(err) => return StageOutcome::failed(format!("writing {}: {err}", layout::VULNS_TAKEOVERS)),
        };

        StageOutcome::ok_with_findings(vec![ArtifactId::new(artifact.id_stage, artifact.id_name)], findings)
    }
}
