//! `reports/summary.md`: executive bullets, top findings, stage table
//! (spec §4.7).

use crate::findings::top_findings;
use crate::Summary;
use camino::Utf8Path;
use reconctl_redaction::SecretRedactor;
use std::fmt::Write as _;

const TOP_FINDINGS_LIMIT: usize = 20;

pub fn render(summary: &Summary, run_root: &Utf8Path, redactor: &SecretRedactor) -> String {
    let mut out = String::new();
    let info = &summary.scan_info;

    let _ = writeln!(out, "# Recon Summary: {}", info.target);
    let _ = writeln!(out);
    let _ = writeln!(out, "- Run started: {}", info.start.to_rfc3339());
    let _ = writeln!(out, "- Run finished: {}", info.end.to_rfc3339());
    let _ = writeln!(out, "- Duration: {} ms", info.duration_ms);
    let _ = writeln!(out, "- Engine version: {}", info.version);
    let _ = writeln!(out);

    let _ = writeln!(out, "## Executive summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Subdomains discovered: {}", summary.statistics.subdomains_found);
    let _ = writeln!(out, "- Live hosts: {}", summary.statistics.live_hosts);
    let _ = writeln!(out, "- Endpoints discovered: {}", summary.statistics.endpoints_discovered);
    let _ = writeln!(out, "- JS files analyzed: {}", summary.statistics.js_files_analyzed);
    let _ = writeln!(out, "- Vulnerabilities flagged: {}", summary.statistics.vulnerabilities);
    let _ = writeln!(
        out,
        "- Findings by severity: critical={} high={} medium={} low={} info={}",
        summary.findings.critical, summary.findings.high, summary.findings.medium, summary.findings.low, summary.findings.info
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "## Top findings");
    let _ = writeln!(out);
    let excerpts = top_findings(run_root, redactor, TOP_FINDINGS_LIMIT);
    if excerpts.is_empty() {
        let _ = writeln!(out, "_No findings recorded._");
    } else {
        let _ = writeln!(out, "| Severity | Category | Host | Detail |");
        let _ = writeln!(out, "|---|---|---|---|");
        for excerpt in &excerpts {
            let _ = writeln!(out, "| {} | {} | {} | {} |", excerpt.severity, excerpt.category, excerpt.host, excerpt.excerpt);
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Stages");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Stage | State | Duration (ms) | Reason |");
    let _ = writeln!(out, "|---|---|---|---|");
    for stage in &info.stages {
        let _ = writeln!(
            out,
            "| {} | {} | {} | {} |",
            stage.name,
            stage.state,
            stage.duration_ms,
            stage.reason.as_deref().unwrap_or("")
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FindingCounts, ScanInfo, Statistics, StageSummary};
    use chrono::Utc;

    #[test]
    fn renders_stage_table_row_per_stage() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let summary = Summary {
            scan_info: ScanInfo {
                target: "example.com".into(),
                start: Utc::now(),
                end: Utc::now(),
                duration_ms: 10,
                version: "0.6.0".into(),
                stages: vec![StageSummary {
                    name: "passive_enum".into(),
                    state: "ok".into(),
                    reason: None,
                    duration_ms: 5,
                }],
            },
            statistics: Statistics::default(),
            findings: FindingCounts::default(),
        };
        let redactor = SecretRedactor::new();
        let md = render(&summary, root, &redactor);
        assert!(md.contains("passive_enum"));
        assert!(md.contains("_No findings recorded._"));
    }
}
