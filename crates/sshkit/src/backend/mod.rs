//! Transport abstraction for remote operations.
//!
//! The [`Transport`] trait is the only way the rest of the system touches a
//! remote host, allowing for different implementations (real OpenSSH,
//! mock for testing).

pub mod ssh;

use crate::error::Result;
use crate::types::{CommandOutcome, Target};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Transport trait for remote operations.
///
/// Both operations block until the remote side finishes. A command that ran
/// and failed is reported through [`CommandOutcome::succeeded`]; `Err` is
/// reserved for failures to start the exchange at all.
pub trait Transport: Send + Sync {
    /// Run a command line on the target.
    fn exec(&self, target: &Target, command: &str) -> Result<CommandOutcome>;

    /// Recursively copy a local path to a remote path.
    ///
    /// With `preserve_mode`, permission bits and times are kept.
    fn copy(
        &self,
        target: &Target,
        local: &Path,
        remote: &str,
        preserve_mode: bool,
    ) -> Result<CommandOutcome>;
}

/// A call observed by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Call {
    /// A command line run on the target
    Exec { target: String, command: String },
    /// A recursive copy to the target
    Copy {
        target: String,
        local: PathBuf,
        remote: String,
        preserve_mode: bool,
    },
}

impl Call {
    /// The command line, for exec calls.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Exec { command, .. } => Some(command),
            Self::Copy { .. } => None,
        }
    }
}

/// Mock backend for testing without a remote host.
///
/// Every call is recorded. Exec calls answer with the outcome registered for
/// the exact command line, falling back to the first registered prefix
/// match, then to a plain success.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    responses: Arc<Mutex<HashMap<String, CommandOutcome>>>,
    prefix_responses: Arc<Mutex<Vec<(String, CommandOutcome)>>>,
    failing_copies: Arc<Mutex<Vec<PathBuf>>>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl MockBackend {
    /// Create a mock where everything succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer an exact command line with an outcome.
    pub fn respond(&self, command: impl Into<String>, outcome: CommandOutcome) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(command.into(), outcome);
    }

    /// Answer every command starting with `prefix` with an outcome.
    pub fn respond_prefix(&self, prefix: impl Into<String>, outcome: CommandOutcome) {
        let mut responses = self.prefix_responses.lock().unwrap();
        responses.push((prefix.into(), outcome));
    }

    /// Make copies of the given local path fail.
    pub fn fail_copy(&self, local: impl Into<PathBuf>) {
        let mut failing = self.failing_copies.lock().unwrap();
        failing.push(local.into());
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Command lines of all exec calls so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.command().map(str::to_string))
            .collect()
    }

    /// Forget recorded calls, keeping scripted responses.
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Transport for MockBackend {
    fn exec(&self, target: &Target, command: &str) -> Result<CommandOutcome> {
        self.record(Call::Exec {
            target: target.to_string(),
            command: command.to_string(),
        });

        if let Some(outcome) = self.responses.lock().unwrap().get(command) {
            return Ok(outcome.clone());
        }

        let prefixes = self.prefix_responses.lock().unwrap();
        Ok(prefixes
            .iter()
            .find(|(prefix, _)| command.starts_with(prefix.as_str()))
            .map(|(_, outcome)| outcome.clone())
            .unwrap_or_else(CommandOutcome::synthesized))
    }

    fn copy(
        &self,
        target: &Target,
        local: &Path,
        remote: &str,
        preserve_mode: bool,
    ) -> Result<CommandOutcome> {
        self.record(Call::Copy {
            target: target.to_string(),
            local: local.to_path_buf(),
            remote: remote.to_string(),
            preserve_mode,
        });

        let failing = self.failing_copies.lock().unwrap();
        if failing.iter().any(|p| p == local) {
            let stderr = format!("scp: {}: No such file or directory", local.display());
            return Ok(CommandOutcome::failure(1, stderr));
        }
        Ok(CommandOutcome::synthesized())
    }
}
