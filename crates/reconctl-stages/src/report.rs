//! `report`: renders `reports/summary.md` and `reports/full_report.html`
//! from `aggregate`'s `summary.json` plus per-finding artifact excerpts
//! (spec §4.6, §4.7). Every quoted string passes through the Redactor
//! before it reaches either document.

use async_trait::async_trait;
use reconctl_stage::{RunContext, Stage, StageOutcome};
use reconctl_store::{layout, ArtifactId};

pub struct Report;

#[async_trait]
impl Stage for Report {
    fn name(&self) -> &'static str {
        "report"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["aggregate"]
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let summary_json = match std::fs::read_to_string(ctx.store.run_root().join(layout::SUMMARY_JSON).as_std_path()) {
            Ok(content) => content,
            Err(err) => return StageOutcome::failed(format!("reading {}: {err}", layout::SUMMARY_JSON)),
        };
        let summary: reconctl_report::Summary = match serde_json::from_str(&summary_json) {
            Ok(summary) => summary,
            Err(err) => return StageOutcome::failed(format!("parsing {}: {err}", layout::SUMMARY_JSON)),
        };

        let markdown = reconctl_report::render_markdown(&summary, ctx.store.run_root(), &ctx.redactor);
        let html = reconctl_report::render_html(&summary, ctx.store.run_root(), &ctx.redactor);

        let md_artifact = match ctx.store.write_text(ArtifactId::new(self.name(), "summary.md"), layout::REPORTS_SUMMARY_MD, &markdown) {
            Ok(artifact) => artifact,
            Err(err) => return StageOutcome::failed(format!("writing {}: {err}", layout::REPORTS_SUMMARY_MD)),
        };
        let html_artifact = match ctx.store.write_text(ArtifactId::new(self.name(), "full_report.html"), layout::REPORTS_FULL_HTML, &html) {
            Ok(artifact) => artifact,
            Err(err) => return StageOutcome::failed(format!("writing {}: {err}", layout::REPORTS_FULL_HTML)),
        };

        StageOutcome::ok(vec![
            ArtifactId::new(md_artifact.id_stage, md_artifact.id_name),
            ArtifactId::new(html_artifact.id_stage, html_artifact.id_name),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;

    #[tokio::test]
    async fn failed_when_summary_json_missing() {
        let (_dir, ctx, _tools) = test_context(&["example.com"]).await;
        let outcome = Report.run(&ctx).await;
        assert!(matches!(outcome, StageOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn renders_both_reports_from_summary_json() {
        let (_dir, ctx, _tools) = test_context(&["example.com"]).await;
        let summary = reconctl_report::aggregate(
            ctx.store.run_root(),
            "example.com",
            "0.6.0",
            chrono::Utc::now(),
            chrono::Utc::now(),
            &[],
        );
        ctx.store.write_json(ArtifactId::new("aggregate", "summary.json"), layout::SUMMARY_JSON, &summary).unwrap();

        let outcome = Report.run(&ctx).await;
        assert!(outcome.is_ok());
        let md = std::fs::read_to_string(ctx.store.run_root().join(layout::REPORTS_SUMMARY_MD)).unwrap();
        assert!(md.contains("example.com"));
        let html = std::fs::read_to_string(ctx.store.run_root().join(layout::REPORTS_FULL_HTML)).unwrap();
        assert!(html.contains("<html"));
    }
}
