//! The concrete Stage catalog (spec §4.6). Each module implements exactly
//! one Stage; [`catalog`] is the full list the Pipeline Engine schedules
//! from, in the same order the spec's dependency table lists them (purely
//! cosmetic — the engine resolves actual order from `depends_on`).

mod common;
pub mod aggregate;
pub mod crawl;
pub mod dir_fuzz;
pub mod dns_resolve;
pub mod js_analyze;
pub mod merge_subdomains;
pub mod param_discover;
pub mod passive_enum;
pub mod port_scan;
pub mod probe_http;
pub mod report;
pub mod screenshot;
pub mod takeover_check;
pub mod vuln_scan;
pub mod wordlist_enum;

#[cfg(test)]
mod test_support;

use reconctl_stage::Stage;
use std::sync::Arc;

/// Every Stage the engine knows about, in declaration order. Adding a new
/// Stage means adding its module above and one line here — nothing else in
/// the engine changes, since scheduling is driven entirely by `depends_on`.
pub fn catalog() -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(passive_enum::PassiveEnum),
        Arc::new(wordlist_enum::WordlistEnum),
        Arc::new(merge_subdomains::MergeSubdomains),
        Arc::new(dns_resolve::DnsResolve),
        Arc::new(probe_http::ProbeHttp),
        Arc::new(screenshot::Screenshot),
        Arc::new(takeover_check::TakeoverCheck),
        Arc::new(crawl::Crawl),
        Arc::new(js_analyze::JsAnalyze),
        Arc::new(param_discover::ParamDiscover),
        Arc::new(dir_fuzz::DirFuzz),
        Arc::new(port_scan::PortScan),
        Arc::new(vuln_scan::VulnScan),
        Arc::new(aggregate::Aggregate),
        Arc::new(report::Report),
    ]
}
