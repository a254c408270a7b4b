//! `aggregate`: reads every completed Stage's artifacts and the engine's
//! per-Stage state log, and writes `summary.json` (spec §4.6, §4.7).
//!
//! Depends softly on the entire rest of the catalog rather than hard — it
//! must run (and report) even when some Stages were SKIPPED or FAILED, so
//! the operator still gets a summary for a partially completed Run.

use async_trait::async_trait;
use reconctl_stage::{RunContext, Stage, StageOutcome};
use reconctl_store::{layout, ArtifactId};

const ALL_OTHER_STAGES: &[&str] = &[
    "passive_enum",
    "wordlist_enum",
    "merge_subdomains",
    "dns_resolve",
    "probe_http",
    "screenshot",
    "takeover_check",
    "crawl",
    "js_analyze",
    "param_discover",
    "dir_fuzz",
    "port_scan",
    "vuln_scan",
];

pub struct Aggregate;

#[async_trait]
impl Stage for Aggregate {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    fn soft_depends_on(&self) -> &'static [&'static str] {
        ALL_OTHER_STAGES
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let stage_log = ctx.stage_log.snapshot();
        let summary = reconctl_report::aggregate(
            ctx.store.run_root(),
            ctx.config.targets.first().map(|t| t.fqdn()).unwrap_or_default(),
            env!("CARGO_PKG_VERSION"),
            ctx.started_at,
            chrono::Utc::now(),
            &stage_log,
        );

        let artifact = match ctx.store.write_json(ArtifactId::new(self.name(), "summary.json"), layout::SUMMARY_JSON, &summary) {
            Ok(artifact) => artifact,
            Err(err) => return StageOutcome::failed(format!("writing {}: {err}", layout::SUMMARY_JSON)),
        };

        StageOutcome::ok(vec![ArtifactId::new(artifact.id_stage, artifact.id_name)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;
    use reconctl_stage::{StageRecord, TerminalState};
    use reconctl_store::layout;

    #[tokio::test]
    async fn writes_summary_json_from_artifacts_and_stage_log() {
        let (_dir, ctx, _tools) = test_context(&["example.com"]).await;
        ctx.store
            .write_lines(
                ArtifactId::new("merge_subdomains", "all.txt"),
                layout::SUBDOMAINS_ALL,
                &["bar.example.com".into(), "foo.example.com".into()],
            )
            .unwrap();
        ctx.stage_log.record(StageRecord {
            name: "merge_subdomains".to_string(),
            state: TerminalState::Ok,
            reason: None,
            duration_ms: 12,
        });

        let outcome = Aggregate.run(&ctx).await;
        assert!(outcome.is_ok());
        let content = std::fs::read_to_string(ctx.store.run_root().join(layout::SUMMARY_JSON)).unwrap();
        let summary: reconctl_report::Summary = serde_json::from_str(&content).unwrap();
        assert_eq!(summary.statistics.subdomains_found, 2);
        assert_eq!(summary.scan_info.stages.len(), 1);
    }
}
