//! `merge_subdomains`: union of `passive_enum`'s output with `wordlist_enum`'s
//! (when it ran), scope-filtered and FQDN-validated, written as the single
//! sorted source of truth every downstream stage reads from (spec §4.6).
//!
//! `wordlist_enum` is a *soft* dependency: it is legitimately `Skipped` under
//! `--passive-only`, and that must not cascade into this stage being
//! skipped too — the merge simply proceeds with whatever `brute.txt`
//! contains, including nothing at all.

use crate::common::{is_valid_fqdn, read_lines, sorted_unique_union};
use async_trait::async_trait;
use reconctl_stage::{RunContext, Stage, StageOutcome};
use reconctl_store::{layout, ArtifactId};

pub struct MergeSubdomains;

#[async_trait]
impl Stage for MergeSubdomains {
    fn name(&self) -> &'static str {
        "merge_subdomains"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["passive_enum"]
    }

    fn soft_depends_on(&self) -> &'static [&'static str] {
        &["wordlist_enum"]
    }

    async fn run(&self, ctx: &RunContext) -> StageOutcome {
        let passive = read_lines(ctx, layout::SUBDOMAINS_PASSIVE);
        let brute = read_lines(ctx, layout::SUBDOMAINS_BRUTE);

        let merged = sorted_unique_union([passive, brute]);
        let filtered: Vec<String> = merged
            .into_iter()
            .map(|h| h.to_ascii_lowercase())
            .filter(|h| is_valid_fqdn(h))
            .filter(|h| ctx.config.in_scope(h))
            .collect();
        // `filter` preserves the sorted order of `sorted_unique_union`'s
        // output, so no second sort is needed here.

        match ctx
            .store
            .write_lines(ArtifactId::new(self.name(), "all.txt"), layout::SUBDOMAINS_ALL, &filtered)
        {
            Ok(artifact) => StageOutcome::ok(vec![ArtifactId::new(artifact.id_stage, artifact.id_name)]),
            Err(err) => StageOutcome::failed(format!("writing {}: {err}", layout::SUBDOMAINS_ALL)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;
    use reconctl_store::ArtifactId as Id;

    #[tokio::test]
    async fn unions_passive_and_brute_regardless_of_write_order() {
        let (_dir, ctx, _tools) = test_context(&["example.com"]).await;
        ctx.store
            .write_lines(Id::new("passive_enum", "passive.txt"), layout::SUBDOMAINS_PASSIVE, &["foo.example.com".into()])
            .unwrap();
        ctx.store
            .write_lines(Id::new("wordlist_enum", "brute.txt"), layout::SUBDOMAINS_BRUTE, &["bar.example.com".into()])
            .unwrap();

        let outcome = MergeSubdomains.run(&ctx).await;
        assert!(outcome.is_ok());
        let content = std::fs::read_to_string(ctx.store.run_root().join(layout::SUBDOMAINS_ALL)).unwrap();
        assert_eq!(content, "bar.example.com\nfoo.example.com\n");
    }

    #[tokio::test]
    async fn proceeds_with_empty_brute_when_wordlist_enum_was_skipped() {
        let (_dir, ctx, _tools) = test_context(&["example.com"]).await;
        ctx.store
            .write_lines(Id::new("passive_enum", "passive.txt"), layout::SUBDOMAINS_PASSIVE, &["foo.example.com".into()])
            .unwrap();
        // No brute.txt written at all, as if wordlist_enum was Skipped.

        let outcome = MergeSubdomains.run(&ctx).await;
        assert!(outcome.is_ok());
        let content = std::fs::read_to_string(ctx.store.run_root().join(layout::SUBDOMAINS_ALL)).unwrap();
        assert_eq!(content, "foo.example.com\n");
    }

    #[tokio::test]
    async fn excludes_out_of_scope_hosts() {
        use crate::test_support::test_context_with_scope;
        let (_dir, ctx, _tools) = test_context_with_scope(&["example.com"], &[], &["^admin\\."]).await;
        ctx.store
            .write_lines(
                Id::new("passive_enum", "passive.txt"),
                layout::SUBDOMAINS_PASSIVE,
                &["api.example.com".into(), "admin.example.com".into()],
            )
            .unwrap();

        MergeSubdomains.run(&ctx).await;
        let content = std::fs::read_to_string(ctx.store.run_root().join(layout::SUBDOMAINS_ALL)).unwrap();
        assert!(!content.contains("admin.example.com"));
        assert!(content.contains("api.example.com"));
    }
}
