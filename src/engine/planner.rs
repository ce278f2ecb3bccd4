//! Provisioning planner - diff desired tools against what the host has

use sshkit::Target;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::{DesiredStateConfig, ToolSpec};
use crate::provision::runtime;
use crate::remote::{Mode, RemoteExecutor};

use super::status;
use super::steps::{self, StepFailure};

/// Independent groups of work in an apply run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    HomeSync,
    Runtime,
    Tools,
    ShellInit,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::HomeSync, Phase::Runtime, Phase::Tools, Phase::ShellInit];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::HomeSync => "home",
            Phase::Runtime => "runtime",
            Phase::Tools => "tools",
            Phase::ShellInit => "shell-init",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Phase::HomeSync => "Sync home directory artifacts",
            Phase::Runtime => "Bootstrap and update the Python environment",
            Phase::Tools => "Install missing tools",
            Phase::ShellInit => "Append shell prompt initialization",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What one run has to do
///
/// Built fresh from live probes each run and never persisted. Tools carry
/// no ordering constraints between each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisioningPlan {
    pub tools_to_install: BTreeMap<String, ToolSpec>,
    pub tools_already_present: BTreeMap<String, Option<String>>,
    pub requires_runtime_bootstrap: bool,
}

impl ProvisioningPlan {
    /// Number of install commands the tools phase will run
    pub fn install_step_count(&self) -> usize {
        self.tools_to_install
            .values()
            .map(|spec| spec.install_steps.len())
            .sum()
    }

    /// Nothing to install and the package manager is present
    pub fn is_satisfied(&self) -> bool {
        self.tools_to_install.is_empty() && !self.requires_runtime_bootstrap
    }
}

/// Probe the host and bucket every configured tool
///
/// All probes are real reads in both modes so a preview reflects the host
/// as it is. The probes are not a consistent snapshot: the host can change
/// between two of them. Planning stops at the first probe that never
/// reached the host.
pub fn plan(
    exec: &RemoteExecutor,
    target: &Target,
    config: &DesiredStateConfig,
    mode: Mode,
) -> Result<ProvisioningPlan, StepFailure> {
    log::info!("Planning {} tool(s) on {target} ({mode:?})", config.tools.len());

    let mut plan = ProvisioningPlan::default();

    for (name, spec) in &config.tools {
        let status = status::check(exec, target, name, spec)?;
        if status.installed {
            log::debug!("{name}: installed ({:?})", status.version);
            plan.tools_already_present.insert(name.clone(), status.version);
        } else {
            log::debug!("{name}: missing");
            plan.tools_to_install.insert(name.clone(), spec.clone());
        }
    }

    let probe = runtime::package_manager_probe();
    let package_manager = exec.probe(target, &probe);
    if package_manager.is_transport_failure() {
        return Err(steps::unreachable("check:package-manager", &probe, &package_manager));
    }
    plan.requires_runtime_bootstrap = !package_manager.succeeded;

    Ok(plan)
}
