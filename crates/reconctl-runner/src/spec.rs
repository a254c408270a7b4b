//! Value types describing a single external-tool invocation and its result.

use reconctl_utils::ring_buffer::BoundedBuffer;
use std::path::PathBuf;
use std::time::Duration;

/// An absolute-path argv invocation. Never passed through a shell; argv[0]
/// must already be absolute by the time this reaches [`crate::ProcessRunner::run`].
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    pub stdin: Option<Vec<u8>>,
    pub deadline: Duration,
}

impl CommandSpec {
    pub fn new(argv: Vec<String>, cwd: PathBuf, deadline: Duration) -> Self {
        Self {
            argv,
            cwd,
            env: Vec::new(),
            stdin: None,
            deadline,
        }
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn with_stdin(mut self, stdin: Vec<u8>) -> Self {
        self.stdin = Some(stdin);
        self
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }
}

/// Why a process was killed by the runner, rather than exiting on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillReason {
    Deadline,
    Cancelled,
}

impl KillReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            KillReason::Deadline => "deadline",
            KillReason::Cancelled => "cancelled",
        }
    }
}

/// Outcome of one invocation. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub exit_code: Option<i32>,
    stdout: BoundedBuffer,
    stderr: BoundedBuffer,
    pub duration: Duration,
    pub timed_out: bool,
    pub kill_reason: Option<KillReason>,
}

impl InvocationResult {
    pub fn new(
        exit_code: Option<i32>,
        stdout: BoundedBuffer,
        stderr: BoundedBuffer,
        duration: Duration,
        timed_out: bool,
        kill_reason: Option<KillReason>,
    ) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration,
            timed_out,
            kill_reason,
        }
    }

    pub fn stdout_bytes(&self) -> &[u8] {
        self.stdout.as_slice()
    }

    pub fn stderr_bytes(&self) -> &[u8] {
        self.stderr.as_slice()
    }

    pub fn stdout_string(&self) -> String {
        self.stdout.to_string_lossy()
    }

    pub fn stderr_string(&self) -> String {
        self.stderr.to_string_lossy()
    }

    pub fn stdout_truncated(&self) -> bool {
        self.stdout.truncated()
    }

    pub fn stderr_truncated(&self) -> bool {
        self.stderr.truncated()
    }

    /// Exit code zero and no timeout/kill occurred.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }
}

/// Strip CR/LF and other non-printable bytes from a value destined for an
/// HTTP header or URL passed to a tool (spec §4.4: argv values may contain
/// shell metacharacters safely since no shell interprets them, but
/// header/URL-shaped inputs must be sanitized against injection into tool
/// wire protocols).
pub fn sanitize_header_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n') && (c.is_ascii_graphic() || *c == ' '))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_crlf() {
        let out = sanitize_header_value("X-Injected: evil\r\nSet-Cookie: x=1");
        assert!(!out.contains('\r'));
        assert!(!out.contains('\n'));
    }

    #[test]
    fn sanitize_strips_non_printable() {
        let out = sanitize_header_value("value\u{0007}with-bell");
        assert_eq!(out, "valuewith-bell");
    }

    #[test]
    fn success_requires_zero_exit_and_no_timeout() {
        let result = InvocationResult::new(
            Some(0),
            BoundedBuffer::new(16),
            BoundedBuffer::new(16),
            Duration::from_secs(1),
            false,
            None,
        );
        assert!(result.success());

        let timed_out = InvocationResult::new(
            Some(0),
            BoundedBuffer::new(16),
            BoundedBuffer::new(16),
            Duration::from_secs(1),
            true,
            Some(KillReason::Deadline),
        );
        assert!(!timed_out.success());
    }
}
