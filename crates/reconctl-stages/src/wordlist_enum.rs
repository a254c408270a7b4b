//! `wordlist_enum`: active subdomain brute force, skipped outright under
//! `--passive-only` (spec §4.6). Prefers `ffuf` when installed; otherwise
//! falls back to a built-in DNS resolver over a small bundled wordlist, so
//! the stage still produces something useful with zero external tools.
//!
//! The wordlist path is always resolved relative to the program directory
//! (or an explicit config override) — it is never treated as a shell
//! fragment, since every invocation goes through [`crate::common::invoke`],
//! which never shells out.

use crate::common::{is_valid_fqdn, locate_and_build};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use reconctl_registry::ToolLocation;
use reconctl_stage::{RunContext, Stage, StageOutcome};
use reconctl_store::{layout, ArtifactId};

/// A minimal built-in wordlist used when no file is configured or found on
/// disk — enough to demonstrate brute force without shipping a large asset.
const BUILTIN_WORDS: &[&str] = &[
    "www", "api", "mail", "ftp", "dev", "staging", "test", "admin", "portal", "vpn", "app", "cdn", "static", "beta",
    "git", "internal", "docs", "status", "support", "shop",
];

fn resolve_wordlist_path(ctx: &RunContext) -> Option<Utf8PathBuf> {
    if let Some(path) = &ctx.config.wordlist {
        return Some(path.clone());
    }
    let exe_dir = std::env::current_exe().ok()?.parent()?.to_path_buf();
    let candidate = exe_dir.join("wordlists").join("subdomains.txt");
    Utf8PathBuf::from_path_buf(candidate).ok()
}

fn read_words(path: Option<&Utf8PathBuf>) -> Vec<String> {
    if let Some(path) = path {
        if let Ok(content) = std::fs::read_to_string(path.as_std_path()) {
            let words: Vec<String> = content.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect();
            if !words.is_empty() {
                return words;
            }
        }
    }
    BUILTIN_WORDS.iter().map(|s| s.to_string()).collect()
}

/// Resolve `candidate` against the system resolver, gated by a Governor
/// permit so built-in brute force stays within the same global concurrency
/// bound as every tool invocation (spec §4.5: "the global concurrency bound
/// holds across the entire Run").
async fn brute_resolve_one(ctx: &RunContext, candidate: String) -> Option<String> {
    let _permit = ctx.acquire_permit().await?;
    tokio::net::lookup_host((candidate.as_str(), 0))
        .await
        .ok()
        .filter(|mut addrs| addrs.next().is_some())
        .map(|_| candidate)
}

async fn builtin_brute(ctx: &RunContext) -> Vec<String> {
    let wordlist_path = resolve_wordlist_path(ctx);
    let words = read_words(wordlist_path.as_ref());
    let mut results = Vec::new();
    for target in &ctx.config.targets {
        for word in &words {
            let candidate = format!("{word}.{}", target.fqdn());
            if let Some(resolved) = brute_resolve_one(ctx, candidate).await {
                results.push(resolved);
            }
        }
    }
    results
}

pub struct WordlistEnum;

#[async_trait]
impl Stage for WordlistEnum {
    fn name(&self) -> &'static str {
        "wordlist_enum"
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        if ctx.config.passive_only {
            return StageOutcome::skipped("passive-only mode excludes active brute force");
        }

        let deadline = ctx.config.stage_timeout(self.name());
        let mut lines: Vec<String> = Vec::new();

        match ctx.registry.locate("ffuf") {
            ToolLocation::Absolute(_) => {
                let wordlist = resolve_wordlist_path(ctx);
                for target in &ctx.config.targets {
                    let Some(wordlist) = &wordlist else { break };
                    let url = format!("https://FUZZ.{}", target.fqdn());
                    let args = vec!["-u".to_string(), url, "-w".to_string(), wordlist.to_string(), "-mc".to_string(), "200".to_string()];
                    let Some(spec) = locate_and_build(ctx, "ffuf", &args, deadline) else { continue };
                    match crate::common::invoke(ctx, &spec).await {
                        Ok(Some(result)) => {
                            lines.extend(
                                result
                                    .stdout_string()
                                    .lines()
                                    .map(|l| l.trim().to_ascii_lowercase())
                                    .filter(|l| is_valid_fqdn(l)),
                            );
                        }
                        Ok(None) => return StageOutcome::skipped("cancelled"),
                        Err(err) => {
                            tracing::warn!(stage = self.name(), error = %err, "ffuf invocation failed; falling back to built-in brute");
                        }
                    }
                }
            }
            ToolLocation::NotInstalled => {
                tracing::info!(stage = self.name(), "ffuf not installed; using built-in DNS brute force");
                lines = builtin_brute(ctx).await;
            }
        }

        let merged = crate::common::sorted_unique_union([lines]);
        match ctx
            .store
            .write_lines(ArtifactId::new(self.name(), "brute.txt"), layout::SUBDOMAINS_BRUTE, &merged)
        {
            Ok(artifact) => StageOutcome::ok(vec![ArtifactId::new(artifact.id_stage, artifact.id_name)]),
            Err(err) => StageOutcome::failed(format!("writing {}: {err}", layout::SUBDOMAINS_BRUTE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;
    use reconctl_runner::stub::ScriptedResponse;

    #[tokio::test]
    async fn skipped_under_passive_only() {
        let (_dir, mut ctx, _tools) = {
            let (dir, ctx, tools) = test_context(&["example.com"]).await;
            (dir, ctx, tools)
        };
        let mut config = (*ctx.config).clone();
        config.passive_only = true;
        ctx.config = std::sync::Arc::new(config);

        let outcome = WordlistEnum.run(&ctx).await;
        assert!(matches!(outcome, StageOutcome::Skipped { reason } if reason.contains("passive-only")));
    }

    #[tokio::test]
    async fn uses_ffuf_output_when_installed() {
        let (_dir, ctx, tools) = test_context(&["example.com"]).await;
        tools.install("ffuf");
        tools.stub().script(ScriptedResponse::ok("ffuf", "dev.example.com\n"));

        let outcome = WordlistEnum.run(&ctx).await;
        assert!(outcome.is_ok());
        let content = std::fs::read_to_string(ctx.store.run_root().join(layout::SUBDOMAINS_BRUTE)).unwrap();
        assert_eq!(content, "dev.example.com\n");
    }
}
