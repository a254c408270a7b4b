//! `reconctl status`: print the State Journal of a run (spec §10.4). With no
//! explicit run directory, picks the most recently modified directory under
//! the default output root — `status` has no target to filter by, unlike
//! `--resume`'s name-prefixed lookup in `reconctl-engine::run`.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use reconctl_config::StatusArgs;
use reconctl_state::Journal;

const DEFAULT_OUTPUT_DIR: &str = "./recon_results";

fn most_recently_modified_dir(base: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut candidates: Vec<(std::time::SystemTime, Utf8PathBuf)> = std::fs::read_dir(base.as_std_path())
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false))
        .filter_map(|entry| {
            let modified = entry.metadata().ok()?.modified().ok()?;
            let path = Utf8PathBuf::from_path_buf(entry.path()).ok()?;
            Some((modified, path))
        })
        .collect();
    candidates.sort_by_key(|(modified, _)| *modified);
    candidates.pop().map(|(_, path)| path)
}

pub fn run(args: StatusArgs) -> anyhow::Result<i32> {
    let run_dir = match args.run_dir {
        Some(dir) => dir,
        None => most_recently_modified_dir(Utf8Path::new(DEFAULT_OUTPUT_DIR))
            .ok_or_else(|| anyhow::anyhow!("no run directories found under {DEFAULT_OUTPUT_DIR}; pass one explicitly"))?,
    };

    let journal_path = run_dir.join(reconctl_store::layout::STATE_JOURNAL);
    let journal = Journal::load(&journal_path).context("reading state journal")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&journal)?);
    } else {
        println!("run {} ({})", journal.run_id, journal.target);
        for entry in &journal.stages {
            let reason = entry.reason.as_deref().map(|r| format!(" — {r}")).unwrap_or_default();
            println!("  {:<8} {:<20} {:>6}ms{reason}", format!("{:?}", entry.state).to_lowercase(), entry.name, entry.duration_ms);
        }
    }

    Ok(reconctl_utils::exit_codes::SUCCESS)
}
