//! Process Runner: spawns external recon tools with no shell, a process
//! group per invocation, a wall-clock deadline, and bounded output capture.

pub mod error;
pub mod native;
pub mod spec;

#[cfg(any(test, feature = "test-utils"))]
pub mod stub;

pub use error::RunnerError;
pub use native::NativeProcessRunner;
pub use spec::{sanitize_header_value, CommandSpec, InvocationResult, KillReason};

use async_trait::async_trait;

/// Abstraction over "run this external tool and wait, with a deadline."
/// Stages depend on `Arc<dyn ProcessRunner>` so tests can substitute
/// [`stub::StubProcessRunner`] without spawning real subprocesses.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<InvocationResult, RunnerError>;
}
