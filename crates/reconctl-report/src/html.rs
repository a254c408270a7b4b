//! `reports/full_report.html`: same content as `summary.md` plus a severity
//! bar chart, rendered as inline SVG rather than a bundled Chart.js asset —
//! see DESIGN.md for why. Self-contained: no `<script>`, no external
//! stylesheet, no network fetch of any kind.

use crate::findings::top_findings;
use crate::Summary;
use camino::Utf8Path;
use reconctl_redaction::SecretRedactor;
use std::fmt::Write as _;

const TOP_FINDINGS_LIMIT: usize = 20;

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

fn severity_bar(label: &str, count: usize, max: usize, color: &str) -> String {
    let width = if max == 0 { 0 } else { (count * 360) / max };
    format!(
        "<div class=\"bar-row\"><span class=\"bar-label\">{label}</span><svg width=\"360\" height=\"18\">\
         <rect width=\"{width}\" height=\"18\" fill=\"{color}\"></rect></svg><span class=\"bar-count\">{count}</span></div>"
    )
}

pub fn render(summary: &Summary, run_root: &Utf8Path, redactor: &SecretRedactor) -> String {
    let info = &summary.scan_info;
    let f = &summary.findings;
    let max = [f.critical, f.high, f.medium, f.low, f.info].into_iter().max().unwrap_or(0);

    let mut out = String::new();
    out.push_str("<!doctype html><html lang=\"en\"><head><meta charset=\"utf-8\">");
    let _ = write!(out, "<title>Recon Summary: {}</title>", escape(&info.target));
    out.push_str(
        "<style>body{font-family:sans-serif;margin:2rem;color:#222}table{border-collapse:collapse;width:100%}\
         td,th{border:1px solid #ccc;padding:4px 8px;text-align:left}.bar-row{display:flex;align-items:center;gap:8px;margin:4px 0}\
         .bar-label{width:80px}</style></head><body>",
    );
    let _ = writeln!(out, "<h1>Recon Summary: {}</h1>", escape(&info.target));
    let _ = writeln!(
        out,
        "<p>Started {} &middot; finished {} &middot; duration {} ms &middot; engine {}</p>",
        escape(&info.start.to_rfc3339()),
        escape(&info.end.to_rfc3339()),
        info.duration_ms,
        escape(&info.version)
    );

    out.push_str("<h2>Executive summary</h2><ul>");
    let _ = writeln!(out, "<li>Subdomains discovered: {}</li>", summary.statistics.subdomains_found);
    let _ = writeln!(out, "<li>Live hosts: {}</li>", summary.statistics.live_hosts);
    let _ = writeln!(out, "<li>Endpoints discovered: {}</li>", summary.statistics.endpoints_discovered);
    let _ = writeln!(out, "<li>JS files analyzed: {}</li>", summary.statistics.js_files_analyzed);
    let _ = writeln!(out, "<li>Vulnerabilities flagged: {}</li>", summary.statistics.vulnerabilities);
    out.push_str("</ul>");

    out.push_str("<h2>Findings by severity</h2>");
    out.push_str(&severity_bar("Critical", f.critical, max, "#b00020"));
    out.push_str(&severity_bar("High", f.high, max, "#e65100"));
    out.push_str(&severity_bar("Medium", f.medium, max, "#f9a825"));
    out.push_str(&severity_bar("Low", f.low, max, "#2e7d32"));
    out.push_str(&severity_bar("Info", f.info, max, "#1565c0"));

    out.push_str("<h2>Top findings</h2>");
    let excerpts = top_findings(run_root, redactor, TOP_FINDINGS_LIMIT);
    if excerpts.is_empty() {
        out.push_str("<p><em>No findings recorded.</em></p>");
    } else {
        out.push_str("<table><tr><th>Severity</th><th>Category</th><th>Host</th><th>Detail</th></tr>");
        for excerpt in &excerpts {
            let _ = writeln!(
                out,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(excerpt.severity),
                escape(&excerpt.category),
                escape(&excerpt.host),
                escape(&excerpt.excerpt)
            );
        }
        out.push_str("</table>");
    }

    out.push_str("<h2>Stages</h2><table><tr><th>Stage</th><th>State</th><th>Duration (ms)</th><th>Reason</th></tr>");
    for stage in &info.stages {
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&stage.name),
            escape(&stage.state),
            stage.duration_ms,
            escape(stage.reason.as_deref().unwrap_or(""))
        );
    }
    out.push_str("</table></body></html>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FindingCounts, ScanInfo, Statistics};
    use chrono::Utc;

    #[test]
    fn escapes_target_name_in_title() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let summary = Summary {
            scan_info: ScanInfo {
                target: "<script>alert(1)</script>".into(),
                start: Utc::now(),
                end: Utc::now(),
                duration_ms: 0,
                version: "0.6.0".into(),
                stages: Vec::new(),
            },
            statistics: Statistics::default(),
            findings: FindingCounts::default(),
        };
        let redactor = SecretRedactor::new();
        let html = render(&summary, root, &redactor);
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
