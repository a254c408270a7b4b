//! YAML config file schema (`--config`). Every field is optional: a file
//! only overrides what it sets, and CLI flags in turn override the file
//! (spec §6: "CLI flags override file values").

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileConfig {
    pub domains: Vec<String>,
    pub output: Option<String>,
    pub threads: Option<usize>,
    pub wordlist: Option<String>,
    pub passive_only: Option<bool>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub webhook: Option<String>,
    pub strict: Option<bool>,
    pub log_format: Option<String>,
    pub circuit_breaker: Option<FileCircuitBreaker>,
    pub stage_timeouts_secs: HashMap<String, u64>,
    pub tool_overrides: HashMap<String, String>,
    pub local_bin: Option<String>,
    pub env_whitelist: Vec<String>,
    pub dir_fuzz_host_cap: Option<usize>,
    pub port_scan_host_cap: Option<usize>,
    pub param_discover_url_cap: Option<usize>,
    pub crawl_depth: Option<usize>,
    pub vuln_severity_filter: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileCircuitBreaker {
    pub threshold: Option<u32>,
    pub cooldown_secs: Option<u64>,
    pub cooldown_cap_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &camino::Utf8Path) -> Result<Self, crate::ConfigError> {
        let raw = std::fs::read_to_string(path.as_std_path()).map_err(|source| crate::ConfigError::ReadFile {
            path: path.to_string(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| crate::ConfigError::ParseFile {
            path: path.to_string(),
            source,
        })
    }
}
