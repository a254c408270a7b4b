//! Aggregator and Reporter (spec §4.7): reads every completed Stage's
//! artifacts straight off disk and builds `summary.json`, then renders
//! `summary.md` and `full_report.html` from that JSON plus per-finding
//! excerpts. Kept as plain, synchronous, Stage-agnostic functions — the
//! `aggregate`/`report` Stages in `reconctl-stages` are thin adapters that
//! call into this crate and write the result through the `ArtifactStore`.
//!
//! "Numbers must be reproducible from the artifacts alone" (spec §4.7): this
//! crate never accepts in-memory `Finding` values, only a run root path and
//! the Stage state/duration log the engine already keeps.

mod findings;
mod html;
mod markdown;

use camino::Utf8Path;
use chrono::{DateTime, Utc};
use reconctl_redaction::SecretRedactor;
use reconctl_stage::{StageRecord, TerminalState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub use findings::FindingExcerpt;

const SUBDOMAINS_ALL: &str = "subdomains/all.txt";
const SUBDOMAINS_LIVE: &str = "subdomains/live.txt";
const ENDPOINTS_URLS: &str = "endpoints/urls.txt";
const JS_FILES: &str = "js/files.txt";
const JS_ENDPOINTS: &str = "js/endpoints.txt";
const JS_SECRETS: &str = "js/secrets.txt";
const VULNS_NUCLEI: &str = "vulns/nuclei.json";
const VULNS_TAKEOVERS: &str = "vulns/takeovers.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSummary {
    pub name: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanInfo {
    pub target: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: u64,
    pub version: String,
    pub stages: Vec<StageSummary>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub subdomains_found: usize,
    pub live_hosts: usize,
    pub vulnerabilities: usize,
    pub endpoints_discovered: usize,
    pub js_files_analyzed: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FindingCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub scan_info: ScanInfo,
    pub statistics: Statistics,
    pub findings: FindingCounts,
}

fn count_lines(run_root: &Utf8Path, rel_path: &str) -> usize {
    std::fs::read_to_string(run_root.join(rel_path).as_std_path())
        .map(|content| content.lines().filter(|l| !l.trim().is_empty()).count())
        .unwrap_or(0)
}

fn unique_line_count(run_root: &Utf8Path, rel_paths: &[&str]) -> usize {
    let mut set = BTreeSet::new();
    for rel_path in rel_paths {
        if let Ok(content) = std::fs::read_to_string(run_root.join(rel_path).as_std_path()) {
            set.extend(content.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string));
        }
    }
    set.len()
}

/// Build `summary.json`'s content from a completed (or partially completed,
/// if cancelled) Run. `stage_log` is the engine's per-Stage terminal-state
/// record; every other number comes straight from artifact files.
pub fn aggregate(
    run_root: &Utf8Path,
    target: &str,
    version: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    stage_log: &[StageRecord],
) -> Summary {
    let stages = stage_log
        .iter()
        .map(|r| StageSummary {
            name: r.name.clone(),
            state: r.state.as_str().to_string(),
            reason: r.reason.clone(),
            duration_ms: r.duration_ms,
        })
        .collect();

    let statistics = Statistics {
        subdomains_found: count_lines(run_root, SUBDOMAINS_ALL),
        live_hosts: count_lines(run_root, SUBDOMAINS_LIVE),
        vulnerabilities: findings::vulnerability_count(run_root, VULNS_NUCLEI, VULNS_TAKEOVERS),
        endpoints_discovered: unique_line_count(run_root, &[ENDPOINTS_URLS, JS_ENDPOINTS]),
        js_files_analyzed: count_lines(run_root, JS_FILES),
    };

    let findings = findings::severity_counts(run_root, VULNS_NUCLEI, VULNS_TAKEOVERS, JS_SECRETS);

    Summary {
        scan_info: ScanInfo {
            target: target.to_string(),
            start,
            end,
            duration_ms: (end - start).num_milliseconds().max(0) as u64,
            version: version.to_string(),
            stages,
        },
        statistics,
        findings,
    }
}

/// Whether any Stage in the log finished outside `{Ok, Skipped}` — used by
/// `--strict` to decide whether the Run as a whole fails (spec §4.6: "FAILED
/// ... does not abort the Run unless `--strict` is set").
pub fn has_failed_stage(stage_log: &[StageRecord]) -> bool {
    stage_log.iter().any(|r| r.state == TerminalState::Failed)
}

pub fn render_markdown(summary: &Summary, run_root: &Utf8Path, redactor: &SecretRedactor) -> String {
    markdown::render(summary, run_root, redactor)
}

pub fn render_html(summary: &Summary, run_root: &Utf8Path, redactor: &SecretRedactor) -> String {
    html::render(summary, run_root, redactor)
}
