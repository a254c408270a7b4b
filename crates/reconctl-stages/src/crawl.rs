//! `crawl`: depth-limited crawl of every live host via `katana`, writing
//! discovered URLs to `endpoints/urls.txt` and discovered JavaScript file
//! URLs to `js/files.txt` (spec §4.6). Depth comes from
//! `Config::crawl_depth` (default 3).

use async_trait::async_trait;
use reconctl_registry::ToolLocation;
use reconctl_stage::{RunContext, Stage, StageOutcome};
use reconctl_store::{layout, ArtifactId};

fn is_js_url(url: &str) -> bool {
    url.split(['?', '#']).next().unwrap_or(url).ends_with(".js")
}

pub struct Crawl;

#[async_trait]
impl Stage for Crawl {
    fn name(&self) -> &'static str {
        "crawl"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["probe_http"]
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let hosts = crate::common::read_lines(ctx, layout::SUBDOMAINS_LIVE);
        if hosts.is_empty() {
            return StageOutcome::skipped("no live hosts to crawl");
        }

        let deadline = ctx.config.stage_timeout(self.name());
        let mut urls = Vec::new();

        match ctx.registry.locate("katana") {
            ToolLocation::Absolute(_) => {
                for host in &hosts {
                    let url = format!("https://{host}");
                    let args = vec![
                        "-u".to_string(),
                        url,
                        "-silent".to_string(),
                        "-depth".to_string(),
                        ctx.config.crawl_depth.to_string(),
                    ];
                    let Some(spec) = crate::common::locate_and_build(ctx, "katana", &args, deadline) else {
                        continue;
                    };
                    match crate::common::invoke(ctx, &spec).await {
                        Ok(Some(result)) => {
                            urls.extend(result.stdout_string().lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string));
                        }
                        Ok(None) => return StageOutcome::skipped("cancelled"),
                        Err(err) => tracing::warn!(stage = self.name(), host = %host, error = %err, "katana invocation failed"),
                    }
                }
            }
            ToolLocation::NotInstalled => return StageOutcome::skipped("katana is not installed"),
        }

        let urls = crate::common::sorted_unique_union([urls]);
        let (js_urls, other_urls): (Vec<String>, Vec<String>) = urls.into_iter().partition(|u| is_js_url(u));

        let urls_artifact = match ctx.store.write_lines(ArtifactId::new(self.name(), "urls.txt"), layout::ENDPOINTS_URLS, &other_urls) {
            Ok(artifact) => artifact,
            Err(err) => return StageOutcome::failed(format!("writing {}: {err}", layout::ENDPOINTS_URLS)),
        };
        let js_artifact = match ctx.store.write_lines(ArtifactId::new(self.name(), "files.txt"), layout::JS_FILES, &js_urls) {
            Ok(artifact) => artifact,
            Err(err) => return StageOutcome::failed(format!("writing {}: {err}", layout::JS_FILES)),
        };

        StageOutcome::ok(vec![
            ArtifactId::new(urls_artifact.id_stage, urls_artifact.id_name),
            ArtifactId::new(js_artifact.id_stage, js_artifact.id_name),
        ])
    }
}
