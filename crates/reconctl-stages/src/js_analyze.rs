//! `js_analyze`: built-in analysis of every JS file `crawl` discovered,
//! using the same secret-regex catalog as the Redactor in
//! "detect-not-redact" mode (spec §4.6), plus a lightweight endpoint
//! extractor for absolute/relative paths embedded in the bundle.
//!
//! Unlike every other fan-out Stage this one has no external tool — it
//! fetches each JS file itself via `reqwest`, so fetches are still gated
//! through the Governor and per-host Circuit Breaker exactly like a
//! subprocess invocation would be, just without a [`reconctl_runner::CommandSpec`]
//! in between.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reconctl_governor::Admission;
use reconctl_stage::{Finding, RunContext, Severity, Stage, StageOutcome};
use reconctl_store::{layout, ArtifactId};
use std::time::Duration;

static ENDPOINT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["'](/[a-zA-Z0-9_\-/.]{2,})["']"#).expect("endpoint regex must compile"));

fn host_of(url: &str) -> Option<String> {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let host = without_scheme.split(['/', '?', '#']).next()?;
    let host = host.split('@').next_back().unwrap_or(host);
    Some(host.split(':').next().unwrap_or(host).to_string())
}

async fn fetch(ctx: &RunContext, client: &reqwest::Client, url: &str, deadline: Duration) -> Option<String> {
    let host = host_of(url)?;
    let breaker = ctx.breakers.get_or_create(&host);
    match breaker.admit() {
        Admission::CircuitOpen => None,
        Admission::Allowed | Admission::Probe => {
            let _permit = ctx.acquire_permit().await?;
            match client.get(url).timeout(deadline).send().await {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(body) => {
                        breaker.record_success();
                        Some(body)
                    }
                    Err(_) => {
                        breaker.record_failure();
                        None
                    }
                },
                _ => {
                    breaker.record_failure();
                    None
                }
            }
        }
    }
}

pub struct JsAnalyze;

#[async_trait]
impl Stage for JsAnalyze {
    fn name(&self) -> &'static str {
        "js_analyze"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["crawl"]
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let js_files = crate::common::read_lines(ctx, layout::JS_FILES);
        if js_files.is_empty() {
            return StageOutcome::skipped("no JS files discovered to analyze");
        }

        let client = match reqwest::Client::builder().build() {
            Ok(client) => client,
            Err(err) => return StageOutcome::failed(format!("building HTTP client: {err}")),
        };
        let deadline = ctx.config.stage_timeout(self.name());

        let mut secret_lines = Vec::new();
        let mut endpoint_lines = Vec::new();
        let mut findings = Vec::new();

        for url in &js_files {
            let Some(body) = fetch(ctx, &client, url, deadline).await else {
                continue;
            };

            for detection in ctx.redactor.detect(&body) {
                let snippet_start = detection.start.saturating_sub(12);
                let snippet_end = (detection.end + 12).min(body.len());
                let snippet = &body[snippet_start..snippet_end];
                secret_lines.push(format!("{url}\t{}\t{snippet}", detection.category));
                findings.push(Finding::new(
                    Severity::High,
                    format!("hardcoded_secret:{}", detection.category),
                    host_of(url).unwrap_or_default(),
                    self.name(),
                    format!("{url}: {snippet}"),
                    &ctx.redactor,
                ));
            }

            for capture in ENDPOINT_PATTERN.captures_iter(&body) {
                endpoint_lines.push(format!("{url}\t{}", &capture[1]));
            }
        }

        let secret_lines = crate::common::sorted_unique_union([secret_lines]);
        let endpoint_lines = crate::common::sorted_unique_union([endpoint_lines]);

        let secrets_artifact = match ctx.store.write_lines(ArtifactId::new(self.name(), "secrets.txt"), layout::JS_SECRETS, &secret_lines) {
            Ok(artifact) => artifact,
            Err(err) => return StageOutcome::failed(format!("writing {}: {err}", layout::JS_SECRETS)),
        };
        let endpoints_artifact = match ctx
            .store
            .write_lines(ArtifactId::new(self.name(), "endpoints.txt"), layout::JS_ENDPOINTS, &endpoint_lines)
        {
            Ok(artifact) => artifact,
            Err(err) => return StageOutcome::failed(format!("writing {}: {err}", layout::JS_ENDPOINTS)),
        };

        StageOutcome::ok_with_findings(
            vec![
                ArtifactId::new(secrets_artifact.id_stage, secrets_artifact.id_name),
                ArtifactId::new(endpoints_artifact.id_stage, endpoints_artifact.id_name),
            ],
            findings,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_of_strips_scheme_path_and_port() {
        assert_eq!(host_of("https://app.example.com:8443/bundle.js?v=2").as_deref(), Some("app.example.com"));
        assert_eq!(host_of("app.example.com/bundle.js").as_deref(), Some("app.example.com"));
    }

    #[test]
    fn endpoint_pattern_extracts_quoted_paths() {
        let body = r#"fetch("/api/v1/users"); const x = '/internal/debug';"#;
        let matches: Vec<&str> = ENDPOINT_PATTERN.captures_iter(body).map(|c| c.get(1).unwrap().as_str()).collect();
        assert_eq!(matches, vec!["/api/v1/users", "/internal/debug"]);
    }

    #[tokio::test]
    async fn skipped_when_no_js_files() {
        let (_dir, ctx, _tools) = crate::test_support::test_context(&["example.com"]).await;
        let outcome = JsAnalyze.run(&ctx).await;
        assert!(matches!(outcome, StageOutcome::Skipped { .. }));
    }
}
