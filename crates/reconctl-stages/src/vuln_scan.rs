//! `vuln_scan`: `nuclei` vulnerability scan over the live host set,
//! writing `vulns/nuclei.json`, filtered to the configured severity set
//! (spec §4.6, §4.3 "Severity filter from config").

use async_trait::async_trait;
use reconctl_registry::ToolLocation;
use reconctl_stage::{Finding, RunContext, Severity, Stage, StageOutcome};
use reconctl_store::{layout, ArtifactId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
struct NucleiFinding {
    host: String,
    #[serde(rename = "template-id")]
    template_id: String,
    info: NucleiInfo,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct NucleiInfo {
    severity: String,
    #[serde(default)]
    name: String,
}

fn severity_from_str(s: &str) -> Severity {
    match s.to_ascii_lowercase().as_str() {
        "critical" => Severity::Critical,
        "high" => Severity::High,
        "medium" => Severity::Medium,
        "low" => Severity::Low,
        _ => Severity::Info,
    }
}

pub struct VulnScan;

#[async_trait]
impl Stage for VulnScan {
    fn name(&self) -> &'static str {
        "vuln_scan"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["probe_http"]
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let hosts = crate::common::read_lines(ctx, layout::SUBDOMAINS_LIVE);
        if hosts.is_empty() {
            return StageOutcome::skipped("no live hosts to scan");
        }

        let ToolLocation::Absolute(_) = ctx.registry.locate("nuclei") else {
            return StageOutcome::skipped("nuclei is not installed");
        };

        let deadline = ctx.config.stage_timeout(self.name());
        let mut args = vec!["-silent".to_string(), "-jsonl".to_string()];
        for host in &hosts {
            args.push("-u".to_string());
            args.push(format!("https://{host}"));
        }
        let Some(spec) = crate::common::locate_and_build(ctx, "nuclei", &args, deadline) else {
            return StageOutcome::failed("nuclei vanished between locate and build");
        };

        let raw: Vec<NucleiFinding> = match crate::common::invoke(ctx, &spec).await {
            Ok(Some(result)) => result.stdout_string().lines().filter_map(|l| serde_json::from_str(l).ok()).collect(),
            Ok(None) => return StageOutcome::skipped("cancelled"),
            Err(err) => return StageOutcome::failed(format!("nuclei invocation failed: {err}")),
        };

        let filtered: Vec<NucleiFinding> = raw.into_iter().filter(|f| ctx.config.vuln_severity_enabled(&f.info.severity)).collect();

        let findings: Vec<Finding> = filtered
            .iter()
            .map(|f| {
                Finding::new(
                    severity_from_str(&f.info.severity),
                    f.template_id.clone(),
                    f.host.clone(),
                    self.name(),
                    format!("{}: {}", f.info.name, f.host),
                    &ctx.redactor,
                )
            })
            .collect();

        let artifact = match ctx.store.write_json(ArtifactId::new(self.name(), "nuclei.json"), layout::VULNS_NUCLEI, &filtered) {
            Ok(artifact) => artifact,
            Err(err) => return StageOutcome::failed(format!("writing {}: {err}", layout::VULNS_NUCLEI)),
        };

        StageOutcome::ok_with_findings(vec![ArtifactId::new(artifact.id_stage, artifact.id_name)], findings)
    }
}
