//! Tracing setup: a console layer (human or JSON, per `--log-format`) plus
//! an optional file layer writing `scan.log` at the Run root once one is
//! known (spec §10.1). Deliberately small next to the teacher's
//! `sysinfo`-backed logger — this crate has no performance-percentile
//! reporting to do, only structured, redaction-friendly event output.

use reconctl_config::LogFormat;
use std::fs::OpenOptions;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

type Registry = tracing_subscriber::Registry;

/// Installs the global subscriber. Must be called exactly once; a second
/// call returns an error instead of panicking, which callers can ignore in
/// tests that build their own runs back-to-back in one process.
pub fn init(format: LogFormat, scan_log_path: Option<&camino::Utf8Path>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Human => fmt::layer().with_target(false).with_writer(std::io::stderr).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
    };

    let file_layer = match scan_log_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path.as_std_path())
                .map_err(|source| anyhow::anyhow!("opening {path} for logging: {source}"))?;
            Some(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(move || file.try_clone().expect("clone scan.log file handle"))
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow::anyhow!("installing tracing subscriber: {err}"))
}
