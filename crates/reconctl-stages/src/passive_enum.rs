//! `passive_enum`: union of subfinder, assetfinder, and amass output for
//! the target domain(s). Each tool runs independently through the
//! Governor; a missing binary or a nonzero exit from one tool never fails
//! the stage as long as at least one tool ran (spec §4.6, scenario S2).

use crate::common::{is_valid_fqdn, locate_and_build, sorted_unique_union};
use async_trait::async_trait;
use reconctl_registry::ToolLocation;
use reconctl_runner::CommandSpec;
use reconctl_stage::{RunContext, Stage, StageOutcome};
use reconctl_store::{layout, ArtifactId};

const TOOLS: &[&str] = &["subfinder", "assetfinder", "amass"];

fn build_argv(tool: &str, domain: &str) -> Vec<String> {
    match tool {
        "subfinder" => vec!["-d".into(), domain.into(), "-silent".into()],
        "assetfinder" => vec!["--subs-only".into(), domain.into()],
        "amass" => vec!["enum".into(), "-passive".into(), "-d".into(), domain.into()],
        _ => vec![domain.into()],
    }
}

pub struct PassiveEnum;

#[async_trait]
impl Stage for PassiveEnum {
    fn name(&self) -> &'static str {
        "passive_enum"
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let deadline = ctx.config.stage_timeout(self.name());
        let mut available = Vec::new();
        let mut missing = Vec::new();
        let mut specs: Vec<(&str, CommandSpec)> = Vec::new();

        for tool in TOOLS {
            match ctx.registry.locate(tool) {
                ToolLocation::Absolute(_) => {
                    for target in &ctx.config.targets {
                        if let Some(spec) = locate_and_build(ctx, tool, &build_argv(tool, target.fqdn()), deadline) {
                            specs.push((tool, spec));
                        }
                    }
                    available.push(*tool);
                }
                ToolLocation::NotInstalled => missing.push(*tool),
            }
        }

        for tool in &missing {
            tracing::warn!(stage = self.name(), tool = %tool, "required tool not installed; continuing without it");
        }

        if available.is_empty() {
            return StageOutcome::skipped("no passive enumeration tool is installed");
        }

        let mut outputs = Vec::new();
        for (tool, spec) in &specs {
            match crate::common::invoke(ctx, spec).await {
                Ok(Some(result)) => {
                    if result.exit_code != Some(0) {
                        tracing::warn!(stage = self.name(), tool = %tool, "tool exited nonzero; union continues with other tools");
                    }
                    let lines: Vec<String> = result
                        .stdout_string()
                        .lines()
                        .map(|l| l.trim().to_ascii_lowercase())
                        .filter(|l| is_valid_fqdn(l))
                        .collect();
                    outputs.push(lines);
                }
                Ok(None) => return StageOutcome::skipped("cancelled"),
                Err(err) => {
                    tracing::warn!(stage = self.name(), tool = %tool, error = %err, "tool invocation failed; union continues");
                }
            }
        }

        let merged = sorted_unique_union(outputs);
        match ctx
            .store
            .write_lines(ArtifactId::new(self.name(), "passive.txt"), layout::SUBDOMAINS_PASSIVE, &merged)
        {
            Ok(artifact) => StageOutcome::ok(vec![ArtifactId::new(artifact.id_stage, artifact.id_name)]),
            Err(err) => StageOutcome::failed(format!("writing {}: {err}", layout::SUBDOMAINS_PASSIVE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;
    use reconctl_runner::stub::ScriptedResponse;

    #[tokio::test]
    async fn unions_available_tools_and_skips_missing_ones() {
        let (_dir, ctx, registry) = test_context(&["example.com"]).await;
        registry.install("subfinder");
        registry.install("assetfinder");
        // amass intentionally not installed.

        let stub = registry.stub();
        stub.script(ScriptedResponse::ok("subfinder", "foo.example.com\n"));
        stub.script(ScriptedResponse::ok("assetfinder", "bar.example.com\nfoo.example.com\n"));

        let outcome = PassiveEnum.run(&ctx).await;
        assert!(outcome.is_ok());
        let content = std::fs::read_to_string(ctx.store.run_root().join(layout::SUBDOMAINS_PASSIVE)).unwrap();
        assert_eq!(content, "bar.example.com\nfoo.example.com\n");
    }

    #[tokio::test]
    async fn skipped_when_no_tool_installed() {
        let (_dir, ctx, _registry) = test_context(&["example.com"]).await;
        let outcome = PassiveEnum.run(&ctx).await;
        assert!(matches!(outcome, StageOutcome::Skipped { .. }));
    }
}
