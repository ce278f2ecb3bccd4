//! Best-effort step execution
//!
//! A [`StepRunner`] wraps the executor for one run. Each step that fails is
//! reported with its captured stderr and recorded, and the caller moves on
//! to the next independent step. Nothing here aborts the run.

use sshkit::{CommandOutcome, RemoteCommand, Target};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::remote::{Mode, RemoteExecutor};
use crate::ui;

use super::planner::ProvisioningPlan;

/// Why a step failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("remote command failed: {command}: {stderr}")]
    RemoteCommand { command: String, stderr: String },

    #[error("host did not answer {command}: {stderr}")]
    Unreachable { command: String, stderr: String },

    #[error("transfer of {} to {remote} failed: {stderr}", .local.display())]
    Transfer {
        local: PathBuf,
        remote: String,
        stderr: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    /// Stable identifier such as `tool:fzf[1]` or `home:.ssh`
    pub step: String,
    pub error: StepError,
}

/// Outcome of one provisioning run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub plan: ProvisioningPlan,
    pub steps_run: usize,
    pub failures: Vec<StepFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Print the diagnostic for a failed step
fn announce(step: &str, description: &str, outcome: &CommandOutcome) {
    let advice = outcome.failure_category().map(|c| c.advice());
    ui::step_failed(step, description, &outcome.stderr, advice);
    log::warn!("step {step} failed: {}", outcome.stderr.trim());
}

/// Record a read-only check that never reached the host
pub fn unreachable(step: &str, command: &RemoteCommand, outcome: &CommandOutcome) -> StepFailure {
    announce(step, command.as_str(), outcome);
    StepFailure {
        step: step.to_string(),
        error: StepError::Unreachable {
            command: command.to_string(),
            stderr: outcome.stderr.trim().to_string(),
        },
    }
}

pub struct StepRunner<'a> {
    exec: &'a RemoteExecutor<'a>,
    target: &'a Target,
    mode: Mode,
    steps_run: usize,
    failures: Vec<StepFailure>,
}

impl<'a> StepRunner<'a> {
    pub fn new(exec: &'a RemoteExecutor<'a>, target: &'a Target, mode: Mode) -> Self {
        Self {
            exec,
            target,
            mode,
            steps_run: 0,
            failures: Vec::new(),
        }
    }

    /// Read-only check, always executed
    pub fn probe(&self, command: &RemoteCommand) -> CommandOutcome {
        self.exec.probe(self.target, command)
    }

    /// Run one mutating command; returns whether it succeeded
    pub fn run(&mut self, step: &str, command: &RemoteCommand) -> bool {
        self.steps_run += 1;
        let outcome = self.exec.run(self.target, command, self.mode);
        if outcome.succeeded {
            return true;
        }

        announce(step, command.as_str(), &outcome);
        self.failures.push(StepFailure {
            step: step.to_string(),
            error: StepError::RemoteCommand {
                command: command.to_string(),
                stderr: outcome.stderr.trim().to_string(),
            },
        });
        false
    }

    /// Copy one local path; returns whether it succeeded
    pub fn copy(&mut self, step: &str, local: &Path, remote: &str, preserve_mode: bool) -> bool {
        self.steps_run += 1;
        let outcome = self
            .exec
            .copy(self.target, local, remote, preserve_mode, self.mode);
        if outcome.succeeded {
            return true;
        }

        announce(step, &format!("copy {} -> {remote}", local.display()), &outcome);
        self.failures.push(StepFailure {
            step: step.to_string(),
            error: StepError::Transfer {
                local: local.to_path_buf(),
                remote: remote.to_string(),
                stderr: outcome.stderr.trim().to_string(),
            },
        });
        false
    }

    #[cfg(test)]
    pub fn failures(&self) -> &[StepFailure] {
        &self.failures
    }

    /// Consume the runner into a report for `plan`
    pub fn finish(self, plan: ProvisioningPlan) -> RunReport {
        RunReport {
            plan,
            steps_run: self.steps_run,
            failures: self.failures,
        }
    }
}
