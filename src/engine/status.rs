//! Tool install-state detection

use sshkit::{RemoteCommand, Target};

use crate::config::ToolSpec;
use crate::remote::RemoteExecutor;

use super::steps::{self, StepFailure};

/// Observed state of one tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub installed: bool,
    pub version: Option<String>,
}

impl ToolStatus {
    pub fn missing() -> Self {
        Self {
            installed: false,
            version: None,
        }
    }
}

/// Run a tool's probe and interpret the outcome
///
/// A tool without a probe is reported missing without contacting the host,
/// so it gets reinstalled on every run. Probes are read-only and run for
/// real even in preview mode. A probe that never reached the host is an
/// error, not a missing tool.
pub fn check(
    exec: &RemoteExecutor,
    target: &Target,
    name: &str,
    spec: &ToolSpec,
) -> Result<ToolStatus, StepFailure> {
    let Some(probe) = spec.probe.as_deref() else {
        return Ok(ToolStatus::missing());
    };

    let command = RemoteCommand::shell(probe);
    let outcome = exec.probe(target, &command);
    if outcome.is_transport_failure() {
        return Err(steps::unreachable(&format!("check:{name}"), &command, &outcome));
    }
    if !outcome.succeeded {
        return Ok(ToolStatus::missing());
    }

    let version = outcome.stdout.trim();
    Ok(ToolStatus {
        installed: true,
        version: (!version.is_empty()).then(|| version.to_string()),
    })
}
