//! `probe_http`: HTTP/HTTPS liveness probe over `subdomains/live.txt`, one
//! invocation per host so the per-host Circuit Breaker can attribute
//! repeated failures (e.g. rate-limit 429s) to the offending host alone,
//! rather than tripping every host sharing one batch invocation (spec §4.5
//! scenario S3).
//!
//! Prefers `httpx` (emits one JSON object per line with `-json`); has no
//! built-in fallback, since a bare TCP connect can't distinguish a live web
//! server from any other open port — that's `port_scan`'s job.

use crate::common::BreakerOutcome;
use async_trait::async_trait;
use reconctl_registry::ToolLocation;
use reconctl_stage::{RunContext, Stage, StageOutcome};
use reconctl_store::{layout, ArtifactId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
struct HttpxRecord {
    url: String,
    #[serde(rename = "status-code")]
    status_code: Option<i32>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    webserver: Option<String>,
}

pub struct ProbeHttp;

#[async_trait]
impl Stage for ProbeHttp {
    fn name(&self) -> &'static str {
        "probe_http"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["dns_resolve"]
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let hosts = crate::common::read_lines(ctx, layout::SUBDOMAINS_LIVE);
        if hosts.is_empty() {
            return StageOutcome::skipped("no live hosts to probe");
        }

        let ToolLocation::Absolute(_) = ctx.registry.locate("httpx") else {
            return StageOutcome::skipped("httpx is not installed");
        };

        let deadline = ctx.config.stage_timeout(self.name());
        let mut records = Vec::new();
        let mut circuit_open_hosts = Vec::new();

        for host in &hosts {
            let url = format!("https://{host}");
            let Some(spec) = crate::common::locate_and_build(
                ctx,
                "httpx",
                &["-u".to_string(), url, "-json".to_string(), "-silent".to_string()],
                deadline,
            ) else {
                continue;
            };

            match crate::common::invoke_with_breaker(ctx, host, &spec).await {
                Ok(BreakerOutcome::Ran(result)) => {
                    for line in result.stdout_string().lines() {
                        if let Ok(record) = serde_json::from_str::<HttpxRecord>(line) {
                            records.push(record);
                        }
                    }
                }
                Ok(BreakerOutcome::CircuitOpen) => circuit_open_hosts.push(host.clone()),
                Ok(BreakerOutcome::Cancelled) => return StageOutcome::skipped("cancelled"),
                Err(err) => {
                    tracing::warn!(stage = self.name(), host = %host, error = %err, "httpx invocation failed");
                }
            }
        }

        if !circuit_open_hosts.is_empty() {
            tracing::warn!(
                stage = self.name(),
                hosts = circuit_open_hosts.len(),
                "skipped probing hosts with an open circuit breaker"
            );
        }

        records.sort_by(|a, b| a.url.cmp(&b.url));
        let artifact = match ctx.store.write_json(ArtifactId::new(self.name(), "httpx.json"), layout::HTTP_HTTPX, &records) {
            Ok(artifact) => artifact,
            Err(err) => return StageOutcome::failed(format!("writing {}: {err}", layout::HTTP_HTTPX)),
        };

        StageOutcome::ok(vec![ArtifactId::new(artifact.id_stage, artifact.id_name)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;
    use reconctl_runner::stub::ScriptedResponse;

    #[tokio::test]
    async fn skipped_when_httpx_not_installed() {
        let (_dir, ctx, _tools) = test_context(&["example.com"]).await;
        ctx.store
            .write_lines(ArtifactId::new("dns_resolve", "live.txt"), layout::SUBDOMAINS_LIVE, &["api.example.com".into()])
            .unwrap();
        let outcome = ProbeHttp.run(&ctx).await;
        assert!(matches!(outcome, StageOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn records_one_invocation_per_host() {
        let (_dir, ctx, tools) = test_context(&["example.com"]).await;
        ctx.store
            .write_lines(
                ArtifactId::new("dns_resolve", "live.txt"),
                layout::SUBDOMAINS_LIVE,
                &["api.example.com".into(), "www.example.com".into()],
            )
            .unwrap();
        tools.install("httpx");
        tools
            .stub()
            .script(ScriptedResponse::ok("httpx", "{\"url\":\"https://api.example.com\",\"status-code\":200}\n"));
        tools
            .stub()
            .script(ScriptedResponse::ok("httpx", "{\"url\":\"https://www.example.com\",\"status-code\":301}\n"));

        let outcome = ProbeHttp.run(&ctx).await;
        assert!(outcome.is_ok());
        assert_eq!(tools.stub().invocations_for("httpx"), 2);
    }
}
