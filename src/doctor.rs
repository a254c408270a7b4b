//! `reconctl doctor`: resolve every tool the Stage catalog is known to
//! shell out to and report which ones are actually on this machine, without
//! requiring a target, authorization, or a Run directory (spec §10.3).

use anyhow::Context;
use camino::Utf8PathBuf;
use reconctl_config::DoctorArgs;
use reconctl_registry::ToolRegistry;
use std::collections::HashMap;

/// Every external tool a Stage may shell out to. Kept here, not derived from
/// `Stage::required_tools()`, because no catalog Stage currently declares
/// one as hard-required — each instead probes `ToolRegistry` itself and
/// degrades (spec §4 "graceful degradation"). This list exists purely for
/// operator visibility.
const KNOWN_TOOLS: &[&str] = &[
    "subfinder",
    "assetfinder",
    "amass",
    "dnsx",
    "httpx",
    "gowitness",
    "katana",
    "nuclei",
    "arjun",
    "ffuf",
    "nmap",
    "subzy",
];

pub fn run(args: DoctorArgs) -> anyhow::Result<i32> {
    let file = match &args.config {
        Some(path) => Some(reconctl_config::file::FileConfig::load(path).context("loading --config file")?),
        None => None,
    };

    let (tool_overrides, local_bin): (HashMap<String, Utf8PathBuf>, Option<Utf8PathBuf>) = match file {
        Some(file) => (
            file.tool_overrides.into_iter().map(|(name, path)| (name, Utf8PathBuf::from(path))).collect(),
            file.local_bin.map(Utf8PathBuf::from),
        ),
        None => (HashMap::new(), None),
    };

    let registry = ToolRegistry::new(tool_overrides, local_bin);
    let report = registry.readiness_report(KNOWN_TOOLS);
    let all_available = report.iter().all(|(_, location)| location.is_available());

    if args.json {
        let entries: Vec<_> = report
            .iter()
            .map(|(name, location)| {
                serde_json::json!({
                    "tool": name,
                    "available": location.is_available(),
                    "path": location.path().map(|p| p.to_string()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for (name, location) in &report {
            match location.path() {
                Some(path) => println!("  ok       {name:<12} {path}"),
                None => println!("  missing  {name:<12}"),
            }
        }
        if !all_available {
            println!("\nmissing tools degrade their Stage rather than fail the run.");
        }
    }

    Ok(reconctl_utils::exit_codes::SUCCESS)
}
