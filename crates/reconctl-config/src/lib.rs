//! Effective configuration: CLI flags, an optional YAML file, environment
//! variables, and built-in defaults merged into one immutable [`Config`]
//! (spec §6, expanded per SPEC_FULL §10.3).
//!
//! Precedence, highest to lowest: CLI flags > YAML file (`--config`) >
//! environment variables > built-in defaults. Validation (target scope,
//! numeric ranges, regex compilation) happens once at build time, before
//! any tool is invoked — the same fail-fast discipline that gates the
//! authorization flag.

pub mod cli;
pub mod file;
pub mod target;

pub use cli::{Cli, Command, DoctorArgs, LogFormat, RunArgs, StatusArgs};
pub use target::{reject_disallowed_ips, Target, TargetError};

use camino::Utf8PathBuf;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile { path: String, source: std::io::Error },

    #[error("failed to parse config file {path} as YAML: {source}")]
    ParseFile { path: String, source: serde_yaml::Error },

    #[error("no target specified: pass -d/--domain, set RECON_TARGET/RECON_DOMAIN/TARGET_DOMAIN, or add `domains` to the config file")]
    NoTarget,

    #[error("invalid target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("invalid scope regex {pattern:?}: {source}")]
    InvalidScopeRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("--i-understand-this-requires-authorization is required before any tool is invoked")]
    AuthorizationRequired,

    #[error("threads must be at least 1")]
    ZeroThreads,
}

const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(600);
const EXTENDED_STAGE_TIMEOUT: Duration = Duration::from_secs(1800);

/// Stages whose default wall-clock budget is 30 minutes rather than 10
/// (spec §5: "every Stage has a wall-clock budget (default 10 min; some
/// have 30)") — the fan-out-heavy and network-scan-heavy stages.
const EXTENDED_TIMEOUT_STAGES: &[&str] = &["port_scan", "vuln_scan", "dir_fuzz", "screenshot"];

pub fn default_stage_timeout(stage_name: &str) -> Duration {
    if EXTENDED_TIMEOUT_STAGES.contains(&stage_name) {
        EXTENDED_STAGE_TIMEOUT
    } else {
        DEFAULT_STAGE_TIMEOUT
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerSettings {
    pub threshold: u32,
    pub cooldown: Duration,
    pub cooldown_cap: Duration,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            threshold: 10,
            cooldown: Duration::from_secs(60),
            cooldown_cap: Duration::from_secs(600),
        }
    }
}

/// The fully merged and validated configuration for one invocation.
/// Immutable once built; every field has already been range/shape-checked.
#[derive(Debug, Clone)]
pub struct Config {
    pub targets: Vec<Target>,
    pub output_dir: Utf8PathBuf,
    pub threads: usize,
    pub wordlist: Option<Utf8PathBuf>,
    pub passive_only: bool,
    pub scope_include_raw: Vec<String>,
    pub scope_include: Vec<Regex>,
    pub scope_exclude_raw: Vec<String>,
    pub scope_exclude: Vec<Regex>,
    pub resume: bool,
    pub webhook: Option<String>,
    pub authorized: bool,
    pub strict: bool,
    pub log_format: LogFormat,
    pub circuit_breaker: CircuitBreakerSettings,
    pub stage_timeout_overrides: HashMap<String, Duration>,
    pub tool_overrides: HashMap<String, Utf8PathBuf>,
    pub local_bin: Option<Utf8PathBuf>,
    pub env_whitelist: Vec<String>,
    pub dir_fuzz_host_cap: usize,
    pub port_scan_host_cap: usize,
    pub param_discover_url_cap: usize,
    pub crawl_depth: usize,
    pub vuln_severity_filter: Vec<String>,
}

/// Severities `vuln_scan` reports on when the config doesn't narrow the set
/// (spec §4.6: "Severity filter from config").
const DEFAULT_VULN_SEVERITIES: &[&str] = &["critical", "high", "medium", "low", "info"];

impl Config {
    pub fn stage_timeout(&self, stage_name: &str) -> Duration {
        self.stage_timeout_overrides
            .get(stage_name)
            .copied()
            .unwrap_or_else(|| default_stage_timeout(stage_name))
    }

    /// Returns `true` when `hostname` survives the include/exclude scope
    /// filter: it must match at least one include pattern (or there are
    /// none) and no exclude pattern.
    pub fn in_scope(&self, hostname: &str) -> bool {
        let included = self.scope_include.is_empty() || self.scope_include.iter().any(|re| re.is_match(hostname));
        let excluded = self.scope_exclude.iter().any(|re| re.is_match(hostname));
        included && !excluded
    }

    /// Whether `vuln_scan` should keep a finding of this severity, per the
    /// configured filter.
    pub fn vuln_severity_enabled(&self, severity: &str) -> bool {
        self.vuln_severity_filter.iter().any(|s| s.eq_ignore_ascii_case(severity))
    }

    /// BLAKE3 over a canonicalized snapshot of every field that affects
    /// what the pipeline *does* — excludes tool versions (Open Question 3)
    /// and anything timestamp-like. Compared against the State Journal on
    /// `--resume` (spec §4.8).
    pub fn config_hash(&self, effective_stage_names: &[&str]) -> String {
        let mut stage_timeouts = BTreeMap::new();
        for name in effective_stage_names {
            stage_timeouts.insert(*name, self.stage_timeout(name).as_secs());
        }
        let mut stage_set: Vec<&str> = effective_stage_names.to_vec();
        stage_set.sort_unstable();

        let snapshot = HashSnapshot {
            targets: self.targets.iter().map(|t| t.fqdn().to_string()).collect(),
            threads: self.threads,
            passive_only: self.passive_only,
            scope_include: self.scope_include_raw.clone(),
            scope_exclude: self.scope_exclude_raw.clone(),
            wordlist: self.wordlist.as_ref().map(|p| p.to_string()),
            strict: self.strict,
            circuit_breaker: (
                self.circuit_breaker.threshold,
                self.circuit_breaker.cooldown.as_secs(),
                self.circuit_breaker.cooldown_cap.as_secs(),
            ),
            stage_timeouts,
            dir_fuzz_host_cap: self.dir_fuzz_host_cap,
            port_scan_host_cap: self.port_scan_host_cap,
            param_discover_url_cap: self.param_discover_url_cap,
            crawl_depth: self.crawl_depth,
            vuln_severity_filter: self.vuln_severity_filter.clone(),
            stage_set,
        };
        let canonical =
            serde_json_canonicalizer::to_vec(&snapshot).expect("config hash snapshot serialization is infallible");
        blake3::hash(&canonical).to_hex().to_string()
    }
}

#[derive(Debug, serde::Serialize)]
struct HashSnapshot<'a> {
    targets: Vec<String>,
    threads: usize,
    passive_only: bool,
    scope_include: Vec<String>,
    scope_exclude: Vec<String>,
    wordlist: Option<String>,
    strict: bool,
    circuit_breaker: (u32, u64, u64),
    stage_timeouts: BTreeMap<&'a str, u64>,
    dir_fuzz_host_cap: usize,
    port_scan_host_cap: usize,
    param_discover_url_cap: usize,
    crawl_depth: usize,
    vuln_severity_filter: Vec<String>,
    stage_set: Vec<&'a str>,
}

/// Reads the fallback target environment variables, in the documented
/// precedence order (spec §6): `RECON_TARGET`, `RECON_DOMAIN`,
/// `TARGET_DOMAIN`, used only when `-d` was not supplied.
fn env_target() -> Option<String> {
    for var in ["RECON_TARGET", "RECON_DOMAIN", "TARGET_DOMAIN"] {
        if let Ok(value) = std::env::var(var) {
            if !value.trim().is_empty() {
                return Some(value);
            }
        }
    }
    None
}

fn env_webhook() -> Option<String> {
    std::env::var("WEBHOOK_URL").ok().filter(|v| !v.trim().is_empty())
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|source| ConfigError::InvalidScopeRegex {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

/// Assembles a [`Config`] from CLI args, an optional YAML file, and the
/// environment, in that precedence order, then validates the result.
pub struct ConfigBuilder {
    cli: RunArgs,
    file: Option<file::FileConfig>,
}

impl ConfigBuilder {
    pub fn new(cli: RunArgs) -> Self {
        Self { cli, file: None }
    }

    pub fn with_file(mut self, file: file::FileConfig) -> Self {
        self.file = Some(file);
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        let file = self.file.unwrap_or_default();
        let cli = self.cli;

        let mut domains = cli.domain.clone();
        if domains.is_empty() {
            domains = file.domains.clone();
        }
        if domains.is_empty() {
            if let Some(env) = env_target() {
                domains.push(env);
            }
        }
        if domains.is_empty() {
            return Err(ConfigError::NoTarget);
        }
        let targets = domains
            .iter()
            .map(|d| Target::parse(d))
            .collect::<Result<Vec<_>, _>>()?;

        let output_dir = cli
            .output
            .or_else(|| file.output.clone().map(Utf8PathBuf::from))
            .unwrap_or_else(|| Utf8PathBuf::from("./recon_results"));

        let threads = cli.threads.or(file.threads).unwrap_or(10);
        if threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }

        let wordlist = cli.wordlist.or_else(|| file.wordlist.clone().map(Utf8PathBuf::from));
        let passive_only = cli.passive_only || file.passive_only.unwrap_or(false);

        let mut scope_include_raw = cli.include.clone();
        scope_include_raw.extend(file.include.clone());
        let mut scope_exclude_raw = cli.exclude.clone();
        scope_exclude_raw.extend(file.exclude.clone());
        let scope_include = compile_patterns(&scope_include_raw)?;
        let scope_exclude = compile_patterns(&scope_exclude_raw)?;

        let webhook = cli.webhook.or_else(|| file.webhook.clone()).or_else(env_webhook);
        let strict = cli.strict || file.strict.unwrap_or(false);

        let log_format = cli.log_format.unwrap_or_else(|| match file.log_format.as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Human,
        });

        let circuit_breaker = CircuitBreakerSettings {
            threshold: file.circuit_breaker.as_ref().and_then(|c| c.threshold).unwrap_or(10),
            cooldown: file
                .circuit_breaker
                .as_ref()
                .and_then(|c| c.cooldown_secs)
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(60)),
            cooldown_cap: file
                .circuit_breaker
                .as_ref()
                .and_then(|c| c.cooldown_cap_secs)
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(600)),
        };

        let stage_timeout_overrides = file
            .stage_timeouts_secs
            .iter()
            .map(|(k, v)| (k.clone(), Duration::from_secs(*v)))
            .collect();

        let tool_overrides = file
            .tool_overrides
            .iter()
            .map(|(k, v)| (k.clone(), Utf8PathBuf::from(v)))
            .collect();

        let local_bin = file.local_bin.clone().map(Utf8PathBuf::from);

        if !cli.authorized {
            return Err(ConfigError::AuthorizationRequired);
        }

        Ok(Config {
            targets,
            output_dir,
            threads,
            wordlist,
            passive_only,
            scope_include_raw,
            scope_include,
            scope_exclude_raw,
            scope_exclude,
            resume: cli.resume,
            webhook,
            authorized: cli.authorized,
            strict,
            log_format,
            circuit_breaker,
            stage_timeout_overrides,
            tool_overrides,
            local_bin,
            env_whitelist: file.env_whitelist.clone(),
            dir_fuzz_host_cap: file.dir_fuzz_host_cap.unwrap_or(10),
            port_scan_host_cap: file.port_scan_host_cap.unwrap_or(5),
            param_discover_url_cap: file.param_discover_url_cap.unwrap_or(50),
            crawl_depth: file.crawl_depth.unwrap_or(3),
            vuln_severity_filter: if file.vuln_severity_filter.is_empty() {
                DEFAULT_VULN_SEVERITIES.iter().map(|s| s.to_string()).collect()
            } else {
                file.vuln_severity_filter.clone()
            },
        })
    }
}
