//! `param_discover`: HTTP parameter discovery via `arjun` over crawled URLs,
//! writing `params/parameters.txt` (spec §4.6). Capped at
//! `Config::param_discover_url_cap` URLs (default 50) — the rest are logged
//! as dropped, never silently discarded.

use async_trait::async_trait;
use reconctl_registry::ToolLocation;
use reconctl_stage::{RunContext, Stage, StageOutcome};
use reconctl_store::{layout, ArtifactId};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ArjunRecord {
    url: String,
    #[serde(default)]
    params: Vec<String>,
}

pub struct ParamDiscover;

#[async_trait]
impl Stage for ParamDiscover {
    fn name(&self) -> &'static str {
        "param_discover"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["probe_http", "crawl"]
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let mut urls = crate::common::read_lines(ctx, layout::ENDPOINTS_URLS);
        if urls.is_empty() {
            return StageOutcome::skipped("no crawled URLs to probe for parameters");
        }

        let cap = ctx.config.param_discover_url_cap;
        if urls.len() > cap {
            tracing::warn!(stage = self.name(), dropped = urls.len() - cap, cap, "URL cap reached; extra URLs skipped");
            urls.truncate(cap);
        }

        let ToolLocation::Absolute(_) = ctx.registry.locate("arjun") else {
            return StageOutcome::skipped("arjun is not installed");
        };

        let deadline = ctx.config.stage_timeout(self.name());
        let mut lines = Vec::new();

        for url in &urls {
            let args = vec!["-u".to_string(), url.clone(), "-oJ".to_string(), "-".to_string()];
            let Some(spec) = crate::common::locate_and_build(ctx, "arjun", &args, deadline) else {
                continue;
            };
            match crate::common::invoke(ctx, &spec).await {
                Ok(Some(result)) => {
                    for line in result.stdout_string().lines() {
                        if let Ok(record) = serde_json::from_str::<ArjunRecord>(line) {
                            for param in record.params {
                                lines.push(format!("{}\t{param}", record.url));
                            }
                        }
                    }
                }
                Ok(None) => return StageOutcome::skipped("cancelled"),
                Err(err) => tracing::warn!(stage = self.name(), url = %url, error = %err, "arjun invocation failed"),
            }
        }

        let lines = crate::common::sorted_unique_union([lines]);
        match ctx.store.write_lines(ArtifactId::new(self.name(), "parameters.txt"), layout::PARAMS_PARAMETERS, &lines) {
            Ok(artifact) => StageOutcome::ok(vec![ArtifactId::new(artifact.id_stage, artifact.id_name)]),
            Err(err) => StageOutcome::failed(format!("writing {}: {err}", layout::PARAMS_PARAMETERS)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;
    use reconctl_runner::stub::ScriptedResponse;

    #[tokio::test]
    async fn caps_urls_and_reports_discovered_params() {
        let (_dir, ctx, tools) = test_context(&["example.com"]).await;
        ctx.store
            .write_lines(
                ArtifactId::new("crawl", "urls.txt"),
                layout::ENDPOINTS_URLS,
                &["https://www.example.com/search".into()],
            )
            .unwrap();
        tools.install("arjun");
        tools.stub().script(ScriptedResponse::ok(
            "arjun",
            "{\"url\":\"https://www.example.com/search\",\"params\":[\"q\",\"page\"]}\n",
        ));

        let outcome = ParamDiscover.run(&ctx).await;
        assert!(outcome.is_ok());
        let content = std::fs::read_to_string(ctx.store.run_root().join(layout::PARAMS_PARAMETERS)).unwrap();
        assert_eq!(content, "https://www.example.com/search\tpage\nhttps://www.example.com/search\tq\n");
    }

    #[tokio::test]
    async fn skipped_when_no_urls() {
        let (_dir, ctx, _tools) = test_context(&["example.com"]).await;
        let outcome = ParamDiscover.run(&ctx).await;
        assert!(matches!(outcome, StageOutcome::Skipped { .. }));
    }
}
