//! Core types shared by every backend.

use crate::error::{Error, FailureCategory, Result};
use std::fmt;
use std::process::Output;

// ============================================================================
// Target
// ============================================================================

/// A remote host, addressed by an SSH config alias or a hostname.
///
/// The identifier is passed to `ssh` as an argument, so it is validated to
/// never look like an option and to contain only characters that appear in
/// host aliases, `user@host` forms and IPv6 literals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target(String);

impl Target {
    /// Validate and wrap a host identifier.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();

        if raw.is_empty() {
            return Err(Error::InvalidTarget {
                target: raw.to_string(),
                reason: "host is empty".to_string(),
            });
        }

        if raw.starts_with('-') {
            return Err(Error::InvalidTarget {
                target: raw.to_string(),
                reason: "host must not start with '-'".to_string(),
            });
        }

        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@' | ':')))
        {
            return Err(Error::InvalidTarget {
                target: raw.to_string(),
                reason: format!("unexpected character '{bad}'"),
            });
        }

        Ok(Self(raw.to_string()))
    }

    /// The identifier as handed to ssh.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// CommandOutcome
// ============================================================================

/// Result of one remote command or file copy.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutcome {
    /// Whether the command exited with status zero
    pub succeeded: bool,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Exit code, when the process exited normally
    pub exit_code: Option<i32>,
}

impl CommandOutcome {
    /// A successful outcome with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// A failed outcome with the given exit code and stderr.
    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(exit_code),
        }
    }

    /// Successful outcome with empty output, reported when nothing ran.
    pub fn synthesized() -> Self {
        Self::success(String::new())
    }

    /// Classify a failed outcome. Returns `None` on success.
    pub fn failure_category(&self) -> Option<FailureCategory> {
        if self.succeeded {
            None
        } else {
            Some(FailureCategory::classify(self.exit_code, &self.stderr))
        }
    }

    /// Whether the exchange failed before the remote command could answer.
    ///
    /// True when ssh could not be started, could not connect, or was
    /// refused authentication. The outcome then says nothing about the
    /// state of the host.
    pub fn is_transport_failure(&self) -> bool {
        if self.succeeded {
            return false;
        }
        self.exit_code.is_none()
            || matches!(
                self.failure_category(),
                Some(FailureCategory::Connection | FailureCategory::Authentication)
            )
    }
}

impl From<Output> for CommandOutcome {
    fn from(output: Output) -> Self {
        Self {
            succeeded: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        }
    }
}

// ============================================================================
// RemoteCommand
// ============================================================================

/// A command line destined for the remote shell.
///
/// `ssh` always hands the remote side a single string, so argument vectors
/// are rendered with POSIX single quoting. The program part is taken
/// verbatim, which lets callers use `"$HOME"/...` paths; arguments are
/// always quoted. [`RemoteCommand::shell`] wraps a user-authored shell
/// snippet that must be passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    line: String,
}

impl RemoteCommand {
    /// Start a command from a trusted program literal.
    pub fn new(program: &str) -> Self {
        Self {
            line: program.to_string(),
        }
    }

    /// A raw shell snippet, sent as-is.
    pub fn shell(snippet: impl Into<String>) -> Self {
        Self {
            line: snippet.into(),
        }
    }

    /// Append one quoted argument.
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.line.push(' ');
        self.line.push_str(&sh_quote(arg.as_ref()));
        self
    }

    /// Append several quoted arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Chain another command with `&&`.
    pub fn and(mut self, next: RemoteCommand) -> Self {
        self.line.push_str(" && ");
        self.line.push_str(&next.line);
        self
    }

    /// Chain a fallback command with `||`.
    pub fn or(mut self, next: RemoteCommand) -> Self {
        self.line.push_str(" || ");
        self.line.push_str(&next.line);
        self
    }

    /// The rendered command line.
    pub fn as_str(&self) -> &str {
        &self.line
    }
}

impl fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

/// Quote a string for a POSIX shell.
///
/// Words made only of safe characters are left bare so rendered commands
/// stay readable in previews.
pub fn sh_quote(s: &str) -> String {
    if !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/' | '=' | ':' | ',' | '+')
        })
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}
