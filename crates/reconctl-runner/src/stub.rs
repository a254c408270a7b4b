//! Test-only [`ProcessRunner`] that never spawns a real process.
//!
//! Scenarios S2-S6 in the engine's test suite script tool behavior (missing
//! binary, repeated 429s, a deadline-exceeding sleeper) by scripting this
//! runner rather than depending on the real tools being installed.

use crate::spec::{CommandSpec, InvocationResult, KillReason};
use crate::{ProcessRunner, RunnerError};
use async_trait::async_trait;
use reconctl_utils::ring_buffer::BoundedBuffer;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted response, keyed by the program name (`argv[0]`'s file
/// name) it should be returned for.
pub struct ScriptedResponse {
    pub program: String,
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub timed_out: bool,
    pub kill_reason: Option<KillReason>,
}

impl ScriptedResponse {
    pub fn ok(program: impl Into<String>, stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            program: program.into(),
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: Vec::new(),
            timed_out: false,
            kill_reason: None,
        }
    }

    pub fn failing(program: impl Into<String>, exit_code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            program: program.into(),
            exit_code: Some(exit_code),
            stdout: Vec::new(),
            stderr: stderr.into(),
            timed_out: false,
            kill_reason: None,
        }
    }

    pub fn timeout(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            exit_code: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            timed_out: true,
            kill_reason: Some(KillReason::Deadline),
        }
    }
}

/// Records every invocation it receives and replays scripted responses
/// keyed by program name, in queued order per program.
#[derive(Default)]
pub struct StubProcessRunner {
    queues: Mutex<std::collections::HashMap<String, VecDeque<ScriptedResponse>>>,
    invocations: Mutex<Vec<CommandSpec>>,
}

impl StubProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, response: ScriptedResponse) {
        self.queues
            .lock()
            .unwrap()
            .entry(response.program.clone())
            .or_default()
            .push_back(response);
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    pub fn invocations_for(&self, program: &str) -> usize {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|spec| program_name(spec.program()) == program)
            .count()
    }
}

fn program_name(argv0: &str) -> &str {
    argv0.rsplit(['/', '\\']).next().unwrap_or(argv0)
}

#[async_trait]
impl ProcessRunner for StubProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<InvocationResult, RunnerError> {
        self.invocations.lock().unwrap().push(spec.clone());

        let name = program_name(spec.program()).to_string();
        let scripted = self
            .queues
            .lock()
            .unwrap()
            .get_mut(&name)
            .and_then(VecDeque::pop_front);

        let Some(scripted) = scripted else {
            // No script configured: behave like a tool that produced
            // nothing, exit 0 — the common "ran fine, zero findings" case.
            return Ok(InvocationResult::new(
                Some(0),
                BoundedBuffer::new(0),
                BoundedBuffer::new(0),
                Duration::from_millis(1),
                false,
                None,
            ));
        };

        let mut stdout = BoundedBuffer::with_default_capacity();
        stdout.extend(&scripted.stdout);
        let mut stderr = BoundedBuffer::with_default_capacity();
        stderr.extend(&scripted.stderr);

        Ok(InvocationResult::new(
            scripted.exit_code,
            stdout,
            stderr,
            Duration::from_millis(1),
            scripted.timed_out,
            scripted.kill_reason,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn spec(program: &str) -> CommandSpec {
        CommandSpec::new(
            vec![format!("/usr/bin/{program}"), "-d".into(), "example.com".into()],
            PathBuf::from("/tmp"),
            Duration::from_secs(1),
        )
    }

    #[tokio::test]
    async fn replays_scripted_response_for_matching_program() {
        let runner = StubProcessRunner::new();
        runner.script(ScriptedResponse::ok("subfinder", "foo.example.com\n"));
        let result = runner.run(&spec("subfinder")).await.unwrap();
        assert_eq!(result.stdout_string(), "foo.example.com\n");
        assert!(result.success());
    }

    #[tokio::test]
    async fn records_every_invocation() {
        let runner = StubProcessRunner::new();
        runner.run(&spec("subfinder")).await.unwrap();
        runner.run(&spec("amass")).await.unwrap();
        assert_eq!(runner.invocation_count(), 2);
        assert_eq!(runner.invocations_for("subfinder"), 1);
    }

    #[tokio::test]
    async fn unscripted_program_returns_empty_success() {
        let runner = StubProcessRunner::new();
        let result = runner.run(&spec("amass")).await.unwrap();
        assert!(result.success());
        assert!(result.stdout_bytes().is_empty());
    }

    #[tokio::test]
    async fn scripted_timeout_is_reported() {
        let runner = StubProcessRunner::new();
        runner.script(ScriptedResponse::timeout("httpx"));
        let result = runner.run(&spec("httpx")).await.unwrap();
        assert!(result.timed_out);
        assert_eq!(result.kill_reason, Some(KillReason::Deadline));
    }
}
