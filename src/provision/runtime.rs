//! Python runtime environment: Miniconda bootstrap, `.condarc`, the named
//! env and its packages.
//!
//! Every step is independent and best-effort. A failed download still lets
//! the later steps run (and most likely fail), so the report lists
//! everything that went wrong in one pass.

use anyhow::{Context, Result};
use serde::Serialize;
use sshkit::{RemoteCommand, sh_quote};

use crate::config::DesiredStateConfig;
use crate::engine::steps::StepRunner;
use crate::ui;

/// conda as found on PATH, else the Miniconda default location
const CONDA: &str = "\"$(command -v conda || echo \"$HOME/miniconda3/bin/conda\")\"";

const INSTALLER_PATH: &str = "/tmp/miniconda-installer.sh";
const INSTALLER_URL: &str = "https://repo.anaconda.com/miniconda/Miniconda3-latest-Linux-$(uname -m).sh";

#[derive(Debug, Serialize)]
struct CondaRc<'a> {
    channels: &'a [String],
    channel_priority: &'static str,
    ssl_verify: bool,
}

/// Read-only check for the package manager binary
pub fn package_manager_probe() -> RemoteCommand {
    RemoteCommand::shell("command -v conda >/dev/null 2>&1")
        .or(RemoteCommand::shell("test -x \"$HOME/miniconda3/bin/conda\""))
}

/// Render `~/.condarc`
pub fn condarc_yaml(channels: &[String]) -> Result<String> {
    let rc = CondaRc {
        channels,
        channel_priority: "flexible",
        ssl_verify: true,
    };
    serde_yaml::to_string(&rc).context("Failed to render .condarc")
}

fn bootstrap_commands() -> Vec<(&'static str, RemoteCommand)> {
    vec![
        (
            "runtime:download",
            RemoteCommand::shell(format!("curl -fsSL -o {INSTALLER_PATH} {INSTALLER_URL}")),
        ),
        (
            "runtime:install",
            RemoteCommand::shell(format!("bash {INSTALLER_PATH} -b -u -p \"$HOME/miniconda3\"")),
        ),
        (
            "runtime:cleanup",
            RemoteCommand::new("rm").args(["-f", INSTALLER_PATH]),
        ),
        (
            "runtime:shell-init",
            RemoteCommand::shell("\"$HOME/miniconda3/bin/conda\" init bash"),
        ),
    ]
}

fn env_exists_probe(env_name: &str) -> RemoteCommand {
    let pattern = format!("^{}[[:space:]]", env_name.replace('.', "\\."));
    RemoteCommand::shell(format!("{CONDA} env list | grep -qE {}", sh_quote(&pattern)))
}

fn write_condarc_command(yaml: &str) -> RemoteCommand {
    RemoteCommand::shell(format!("printf '%s' {} > \"$HOME/.condarc\"", sh_quote(yaml)))
}

/// Bring the runtime environment to the configured state
pub fn sync(steps: &mut StepRunner, config: &DesiredStateConfig, requires_bootstrap: bool) -> Result<()> {
    if requires_bootstrap {
        ui::info("Package manager not found, bootstrapping Miniconda");
        for (step, command) in bootstrap_commands() {
            steps.run(step, &command);
        }
    } else {
        ui::dim("Package manager present");
    }

    let yaml = condarc_yaml(&config.conda_channels)?;
    steps.run("runtime:condarc", &write_condarc_command(&yaml));

    let env = config.env_name.as_str();
    if steps.probe(&env_exists_probe(env)).succeeded {
        ui::dim(&format!("Reusing environment {env}"));
    } else {
        let create = RemoteCommand::new(CONDA)
            .args(["create", "-y", "-n", env])
            .arg(format!("python={}", config.python_version));
        steps.run("runtime:create-env", &create);
    }

    if !config.conda_packages.is_empty() {
        let install = RemoteCommand::new(CONDA)
            .args(["install", "-y", "-n", env])
            .args(&config.conda_packages);
        steps.run("runtime:conda-packages", &install);
    }

    if !config.pip_packages.is_empty() {
        let install = RemoteCommand::new(CONDA)
            .args(["run", "-n", env, "python", "-m", "pip", "install"])
            .args(&config.pip_packages);
        steps.run("runtime:pip-packages", &install);
    }

    Ok(())
}
