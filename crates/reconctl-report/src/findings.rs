//! Severity bucketing and top-finding excerpts, read straight back off the
//! `vulns/*.json` and `js/secrets.txt` artifacts rather than from in-memory
//! `Finding` values (spec §4.7: "the aggregator adds no new data").

use camino::Utf8Path;
use reconctl_redaction::SecretRedactor;
use serde::Deserialize;

use crate::FindingCounts;

#[derive(Debug, Deserialize)]
struct NucleiLite {
    host: String,
    #[serde(rename = "template-id")]
    template_id: String,
    info: NucleiInfoLite,
}

#[derive(Debug, Deserialize)]
struct NucleiInfoLite {
    severity: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct TakeoverLite {
    host: String,
    vulnerable: bool,
    #[serde(default)]
    fingerprint: Option<String>,
}

fn read_json<T: for<'de> Deserialize<'de>>(run_root: &Utf8Path, rel_path: &str) -> Vec<T> {
    std::fs::read_to_string(run_root.join(rel_path).as_std_path())
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default()
}

pub fn vulnerability_count(run_root: &Utf8Path, nuclei_path: &str, takeovers_path: &str) -> usize {
    let nuclei: Vec<NucleiLite> = read_json(run_root, nuclei_path);
    let takeovers: Vec<TakeoverLite> = read_json(run_root, takeovers_path);
    nuclei.len() + takeovers.iter().filter(|t| t.vulnerable).count()
}

fn bump(counts: &mut FindingCounts, severity: &str) {
    match severity.to_ascii_lowercase().as_str() {
        "critical" => counts.critical += 1,
        "high" => counts.high += 1,
        "medium" => counts.medium += 1,
        "low" => counts.low += 1,
        _ => counts.info += 1,
    }
}

pub fn severity_counts(run_root: &Utf8Path, nuclei_path: &str, takeovers_path: &str, secrets_path: &str) -> FindingCounts {
    let mut counts = FindingCounts::default();
    let nuclei: Vec<NucleiLite> = read_json(run_root, nuclei_path);
    for finding in &nuclei {
        bump(&mut counts, &finding.info.severity);
    }
    let takeovers: Vec<TakeoverLite> = read_json(run_root, takeovers_path);
    counts.high += takeovers.iter().filter(|t| t.vulnerable).count();

    let secrets = std::fs::read_to_string(run_root.join(secrets_path).as_std_path()).unwrap_or_default();
    counts.high += secrets.lines().filter(|l| !l.trim().is_empty()).count();

    counts
}

/// One redacted excerpt suitable for embedding in `summary.md` /
/// `full_report.html`'s "top findings" section.
#[derive(Debug, Clone)]
pub struct FindingExcerpt {
    pub severity: &'static str,
    pub category: String,
    pub host: String,
    pub excerpt: String,
}

fn severity_rank(s: &str) -> u8 {
    match s {
        "critical" => 0,
        "high" => 1,
        "medium" => 2,
        "low" => 3,
        _ => 4,
    }
}

pub fn top_findings(run_root: &Utf8Path, redactor: &SecretRedactor, limit: usize) -> Vec<FindingExcerpt> {
    let mut excerpts = Vec::new();

    for finding in read_json::<NucleiLite>(run_root, "vulns/nuclei.json") {
        let severity = match finding.info.severity.to_ascii_lowercase().as_str() {
            "critical" => "critical",
            "high" => "high",
            "medium" => "medium",
            "low" => "low",
            _ => "info",
        };
        excerpts.push(FindingExcerpt {
            severity,
            category: finding.template_id.clone(),
            host: finding.host.clone(),
            excerpt: redactor.redact(&format!("{}: {}", finding.info.name, finding.host)),
        });
    }

    for takeover in read_json::<TakeoverLite>(run_root, "vulns/takeovers.json") {
        if !takeover.vulnerable {
            continue;
        }
        excerpts.push(FindingExcerpt {
            severity: "high",
            category: "subdomain_takeover".to_string(),
            host: takeover.host.clone(),
            excerpt: redactor.redact(&format!(
                "{} appears takeover-vulnerable ({})",
                takeover.host,
                takeover.fingerprint.as_deref().unwrap_or("unknown provider")
            )),
        });
    }

    if let Ok(secrets) = std::fs::read_to_string(run_root.join("js/secrets.txt").as_std_path()) {
        for line in secrets.lines().filter(|l| !l.trim().is_empty()) {
            let mut parts = line.splitn(3, '\t');
            let url = parts.next().unwrap_or_default();
            let category = parts.next().unwrap_or("hardcoded_secret");
            excerpts.push(FindingExcerpt {
                severity: "high",
                category: format!("hardcoded_secret:{category}"),
                host: url.to_string(),
                excerpt: redactor.redact(line),
            });
        }
    }

    excerpts.sort_by_key(|e| severity_rank(e.severity));
    excerpts.truncate(limit);
    excerpts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Utf8Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn vulnerable_takeover_counts_as_high_severity() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        write(
            root,
            "vulns/takeovers.json",
            r#"[{"host":"stale.example.com","vulnerable":true,"fingerprint":"github-pages"}]"#,
        );
        let counts = severity_counts(root, "vulns/nuclei.json", "vulns/takeovers.json", "js/secrets.txt");
        assert_eq!(counts.high, 1);
    }

    #[test]
    fn missing_artifact_files_yield_zero_counts() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let counts = severity_counts(root, "vulns/nuclei.json", "vulns/takeovers.json", "js/secrets.txt");
        assert_eq!(counts.critical, 0);
        assert_eq!(counts.high, 0);
    }

    #[test]
    fn top_findings_ranks_critical_before_low() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        write(
            root,
            "vulns/nuclei.json",
            r#"[{"host":"a.example.com","template-id":"t1","info":{"severity":"low","name":"Low thing"}},
               {"host":"b.example.com","template-id":"t2","info":{"severity":"critical","name":"RCE"}}]"#,
        );
        let redactor = SecretRedactor::new();
        let excerpts = top_findings(root, &redactor, 10);
        assert_eq!(excerpts[0].severity, "critical");
    }
}
