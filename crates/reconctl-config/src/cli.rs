//! The CLI surface (spec §6, expanded per SPEC_FULL §10.4). Parsing lives in
//! this crate because it is the first thing `reconctl-config` needs in
//! order to build an effective [`crate::Config`] — it is not a mechanical
//! stub delegated elsewhere.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "reconctl", version, about = "Staged external-recon orchestration engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the recon pipeline against one or more authorized targets.
    Run(RunArgs),
    /// Resume a previous run; shorthand for `run --resume`.
    Resume(RunArgs),
    /// Preflight-check that every tool named in the stage catalog resolves.
    Doctor(DoctorArgs),
    /// Print the State Journal of a run as JSON or a table.
    Status(StatusArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Parser, Clone)]
pub struct RunArgs {
    /// Target FQDN. May repeat to expand scope to multiple targets.
    #[arg(short = 'd', long = "domain", required = false)]
    pub domain: Vec<String>,

    /// Run-root parent directory.
    #[arg(short = 'o', long = "output")]
    pub output: Option<Utf8PathBuf>,

    /// Governor permits: maximum in-flight tool invocations.
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    /// Override the brute-force wordlist path.
    #[arg(short = 'w', long = "wordlist")]
    pub wordlist: Option<Utf8PathBuf>,

    /// Exclude active stages; only passive enumeration runs.
    #[arg(long = "passive-only")]
    pub passive_only: bool,

    /// Scope include regex, applied after discovery. May repeat.
    #[arg(long = "include")]
    pub include: Vec<String>,

    /// Scope exclude regex, applied after discovery. May repeat.
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,

    /// Use the State Journal from a prior run if the config hash matches.
    #[arg(long = "resume")]
    pub resume: bool,

    /// Load a YAML config file; CLI flags override its values.
    #[arg(long = "config")]
    pub config: Option<Utf8PathBuf>,

    /// POST the final summary JSON to this URL on completion.
    #[arg(long = "webhook")]
    pub webhook: Option<String>,

    /// Required: explicit acknowledgment that the target is authorized.
    #[arg(long = "i-understand-this-requires-authorization")]
    pub authorized: bool,

    /// A Stage reaching FAILED aborts the run with exit code 1.
    #[arg(long = "strict")]
    pub strict: bool,

    /// Console/file log record format.
    #[arg(long = "log-format", value_enum)]
    pub log_format: Option<LogFormat>,
}

#[derive(Debug, Parser, Clone)]
pub struct DoctorArgs {
    #[arg(long = "config")]
    pub config: Option<Utf8PathBuf>,
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct StatusArgs {
    /// Run directory to inspect; defaults to the most recently started run
    /// under `./recon_results`.
    pub run_dir: Option<Utf8PathBuf>,
    #[arg(long = "json")]
    pub json: bool,
}
