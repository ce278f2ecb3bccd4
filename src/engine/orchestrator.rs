//! One provisioning run, start to finish

use anyhow::{Context, Result};
use sshkit::{RemoteCommand, Target, Transport};

use crate::config::{self, ConfigSource, DesiredStateConfig};
use crate::paths::ProjectLayout;
use crate::provision::{home, runtime, shellrc};
use crate::remote::{Mode, RemoteExecutor};
use crate::ui;

use super::planner::{self, Phase, ProvisioningPlan};
use super::reporter;
use super::steps::{RunReport, StepRunner};

/// Plan against `target` and, in apply mode, converge it
///
/// Preview returns after printing the plan: no staging writes locally and
/// nothing but probes remotely. Apply runs every phase even when earlier
/// steps failed; failures are collected in the returned report. A host that
/// cannot be reached while planning ends the run with that one failure and
/// no plan, in both modes. `Err` is
/// reserved for local problems such as an unwritable config or staging dir.
pub fn run_once(
    transport: &dyn Transport,
    target: &Target,
    mode: Mode,
    layout: &ProjectLayout,
) -> Result<RunReport> {
    let loaded = config::load(&layout.config_file).context("Failed to load config")?;
    if let ConfigSource::Fallback { reason } = &loaded.source {
        log::warn!("using default config: {reason}");
    }
    let config = loaded.config;

    let exec = RemoteExecutor::new(transport);

    ui::section(&format!("Checking {target}"));
    let plan = match planner::plan(&exec, target, &config, mode) {
        Ok(plan) => plan,
        Err(failure) => {
            ui::error(&format!("Could not inspect {target}; nothing was changed"));
            return Ok(RunReport {
                failures: vec![failure],
                ..RunReport::default()
            });
        }
    };
    if plan.is_satisfied() {
        log::info!("{target}: every tool present, package manager installed");
    } else {
        log::info!("{target}: {} install step(s) pending", plan.install_step_count());
    }

    if mode.is_preview() {
        reporter::print(target.as_str(), &plan);
        return Ok(RunReport {
            plan,
            ..RunReport::default()
        });
    }

    let mut steps = StepRunner::new(&exec, target, mode);
    for (i, phase) in Phase::ALL.iter().enumerate() {
        log::info!("phase {phase}");
        ui::step(i + 1, Phase::ALL.len(), phase.description());
        run_phase(*phase, &mut steps, &config, &plan, layout)?;
    }

    let report = steps.finish(plan);
    print_summary(target, &report);
    Ok(report)
}

fn run_phase(
    phase: Phase,
    steps: &mut StepRunner,
    config: &DesiredStateConfig,
    plan: &ProvisioningPlan,
    layout: &ProjectLayout,
) -> Result<()> {
    match phase {
        Phase::HomeSync => {
            home::stage_shell_rc(layout, config)?;
            let entry = layout.home_ignore_entry();
            if home::ensure_ignored(&layout.ignore_file, &entry)? {
                ui::dim(&format!("Added {entry} to {}", layout.ignore_file.display()));
            }
            home::sync(steps, &layout.home_dir)
        }
        Phase::Runtime => runtime::sync(steps, config, plan.requires_runtime_bootstrap),
        Phase::Tools => {
            install_tools(steps, plan);
            Ok(())
        }
        Phase::ShellInit => {
            steps.run("shell-init", &shellrc::prompt_init_command());
            Ok(())
        }
    }
}

/// Run each pending tool's install steps in order
///
/// The steps of one tool build on each other, so the first failure skips
/// the rest of that tool. Other tools still run.
fn install_tools(steps: &mut StepRunner, plan: &ProvisioningPlan) {
    if plan.tools_to_install.is_empty() {
        ui::dim("All tools already installed");
        return;
    }

    for (name, spec) in &plan.tools_to_install {
        ui::info(&format!("Installing {name}"));
        for (i, step) in spec.install_steps.iter().enumerate() {
            if !steps.run(&format!("tool:{name}[{i}]"), &RemoteCommand::shell(step)) {
                ui::dim(&format!("Skipping remaining steps for {name}"));
                break;
            }
        }
    }
}

fn print_summary(target: &Target, report: &RunReport) {
    ui::section("Summary");
    ui::kv("Steps run", &report.steps_run.to_string());
    ui::kv("Failed", &report.failures.len().to_string());

    if report.is_success() {
        ui::success(&format!("{target} is provisioned"));
        return;
    }

    for failure in &report.failures {
        ui::error(&format!("{}: {}", failure.step, failure.error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sshkit::{Call, CommandOutcome, MockBackend};
    use std::fs;
    use tempfile::TempDir;

    fn target() -> Target {
        Target::parse("gpu-box").unwrap()
    }

    fn write_config(layout: &ProjectLayout, json: &str) {
        fs::write(&layout.config_file, json).unwrap();
    }

    /// Config with one probe-able tool `foo` and no packages
    fn foo_layout() -> (TempDir, ProjectLayout) {
        let temp = TempDir::new().unwrap();
        let layout = ProjectLayout::at(temp.path());
        write_config(
            &layout,
            r#"{
                "conda_packages": [],
                "pip_packages": [],
                "tools": {"foo": {"check": "which foo", "install": ["echo hi"]}}
            }"#,
        );
        (temp, layout)
    }

    fn count(mock: &MockBackend, command: &str) -> usize {
        mock.commands().iter().filter(|c| *c == command).count()
    }

    #[test]
    fn test_preview_only_probes_and_writes_nothing() {
        let (_temp, layout) = foo_layout();
        let mock = MockBackend::new();
        mock.respond("which foo", CommandOutcome::failure(1, ""));

        let report = run_once(&mock, &target(), Mode::Preview, &layout).unwrap();

        assert!(report.is_success());
        assert_eq!(report.steps_run, 0);
        assert_eq!(report.plan.tools_to_install.len(), 1);
        assert_eq!(
            mock.commands(),
            vec![
                "which foo".to_string(),
                runtime::package_manager_probe().to_string(),
            ]
        );
        assert!(!mock.calls().iter().any(|c| matches!(c, Call::Copy { .. })));
        assert!(!layout.home_dir.exists());
        assert!(!layout.ignore_file.exists());
    }

    #[test]
    fn test_preview_is_repeatable() {
        let (_temp, layout) = foo_layout();
        let mock = MockBackend::new();
        mock.respond("which foo", CommandOutcome::failure(1, ""));

        let first = run_once(&mock, &target(), Mode::Preview, &layout).unwrap();
        let second = run_once(&mock, &target(), Mode::Preview, &layout).unwrap();

        assert_eq!(first.plan, second.plan);
        assert_eq!(reporter::render(&first.plan), reporter::render(&second.plan));
        assert_eq!(count(&mock, "echo hi"), 0);
    }

    #[test]
    fn test_apply_installs_missing_tool_once() {
        let (_temp, layout) = foo_layout();
        let mock = MockBackend::new();
        mock.respond("which foo", CommandOutcome::failure(1, ""));

        let report = run_once(&mock, &target(), Mode::Apply, &layout).unwrap();

        assert!(report.is_success());
        assert_eq!(count(&mock, "echo hi"), 1);
    }

    #[test]
    fn test_second_apply_installs_nothing() {
        let (_temp, layout) = foo_layout();
        let mock = MockBackend::new();
        mock.respond("which foo", CommandOutcome::failure(1, ""));
        run_once(&mock, &target(), Mode::Apply, &layout).unwrap();

        // host now has foo
        mock.respond("which foo", CommandOutcome::success("/usr/bin/foo\n"));
        mock.clear_calls();
        let report = run_once(&mock, &target(), Mode::Apply, &layout).unwrap();

        assert!(report.plan.tools_to_install.is_empty());
        assert_eq!(count(&mock, "echo hi"), 0);
    }

    #[test]
    fn test_shell_init_is_last() {
        let (_temp, layout) = foo_layout();
        let mock = MockBackend::new();

        run_once(&mock, &target(), Mode::Apply, &layout).unwrap();

        let commands = mock.commands();
        assert_eq!(
            commands.last(),
            Some(&shellrc::prompt_init_command().to_string())
        );
        assert_eq!(count(&mock, &shellrc::prompt_init_command().to_string()), 1);
    }

    #[test]
    fn test_apply_stages_local_artifacts() {
        let (_temp, layout) = foo_layout();
        let mock = MockBackend::new();

        run_once(&mock, &target(), Mode::Apply, &layout).unwrap();

        assert!(layout.home_dir.join(".bashrc").is_file());
        assert_eq!(fs::read_to_string(&layout.ignore_file).unwrap(), "home/\n");
        assert!(mock.calls().iter().any(|c| matches!(
            c,
            Call::Copy { local, .. } if local.ends_with(".bashrc")
        )));
    }

    #[test]
    fn test_ssh_is_locked_down_after_copy() {
        let (_temp, layout) = foo_layout();
        fs::create_dir_all(layout.home_dir.join(".ssh")).unwrap();
        fs::write(layout.home_dir.join(".ssh/config"), "Host *\n").unwrap();
        let mock = MockBackend::new();

        run_once(&mock, &target(), Mode::Apply, &layout).unwrap();

        let calls = mock.calls();
        let copy_at = calls
            .iter()
            .position(|c| {
                matches!(c, Call::Copy { local, preserve_mode: true, .. } if local.ends_with(".ssh"))
            })
            .unwrap();
        let chmod = calls[copy_at + 1].command().unwrap();
        assert!(chmod.starts_with("chmod 700 \"$HOME/.ssh\""));
        assert!(chmod.contains("chmod 600"));
    }

    #[test]
    fn test_failures_are_collected_and_run_finishes() {
        let temp = TempDir::new().unwrap();
        let layout = ProjectLayout::at(temp.path());
        write_config(
            &layout,
            r#"{"tools": {
                "a": {"install": ["step-a1", "step-a2"]},
                "b": {"install": ["step-b1"]}
            }}"#,
        );
        let mock = MockBackend::new();
        mock.respond("step-a1", CommandOutcome::failure(2, "a1 broke"));

        let report = run_once(&mock, &target(), Mode::Apply, &layout).unwrap();

        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].step, "tool:a[0]");
        assert_eq!(count(&mock, "step-a2"), 0);
        assert_eq!(count(&mock, "step-b1"), 1);
        assert_eq!(
            mock.commands().last(),
            Some(&shellrc::prompt_init_command().to_string())
        );
    }

    #[test]
    fn test_unreachable_host_fails_preview() {
        let (_temp, layout) = foo_layout();
        let mock = MockBackend::new();
        mock.respond_prefix(
            "",
            CommandOutcome::failure(255, "ssh: connect to host gpu-box port 22: Connection refused"),
        );

        let report = run_once(&mock, &target(), Mode::Preview, &layout).unwrap();

        assert!(!report.is_success());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].step, "check:foo");
        assert!(report.plan.tools_to_install.is_empty());
        assert!(!report.plan.requires_runtime_bootstrap);
        assert_eq!(mock.commands(), vec!["which foo".to_string()]);
    }

    #[test]
    fn test_unreachable_host_changes_nothing_in_apply() {
        let (_temp, layout) = foo_layout();
        let mock = MockBackend::new();
        mock.respond_prefix("", CommandOutcome::failure(255, "Host key verification failed."));

        let report = run_once(&mock, &target(), Mode::Apply, &layout).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.steps_run, 0);
        assert_eq!(count(&mock, "echo hi"), 0);
        assert!(!mock.calls().iter().any(|c| matches!(c, Call::Copy { .. })));
        assert!(!layout.home_dir.exists());
    }

    #[test]
    fn test_empty_tools_map() {
        let temp = TempDir::new().unwrap();
        let layout = ProjectLayout::at(temp.path());
        write_config(&layout, r#"{"tools": {}}"#);
        let mock = MockBackend::new();

        let report = run_once(&mock, &target(), Mode::Preview, &layout).unwrap();

        assert!(report.plan.tools_to_install.is_empty());
        assert!(report.plan.tools_already_present.is_empty());
        assert_eq!(mock.commands().len(), 1);
    }

    #[test]
    fn test_first_run_materializes_config() {
        let temp = TempDir::new().unwrap();
        let layout = ProjectLayout::at(temp.path());
        let mock = MockBackend::new();

        let first = run_once(&mock, &target(), Mode::Preview, &layout).unwrap();
        let second = run_once(&mock, &target(), Mode::Preview, &layout).unwrap();

        let loaded = config::load(&layout.config_file).unwrap();
        assert_eq!(loaded.source, ConfigSource::File);
        assert_eq!(loaded.config, DesiredStateConfig::default());
        // materializing on the first run does not change what is printed
        assert_eq!(reporter::render(&first.plan), reporter::render(&second.plan));
    }

    #[test]
    fn test_malformed_config_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let layout = ProjectLayout::at(temp.path());
        write_config(&layout, "{ not json");
        let mock = MockBackend::new();

        let report = run_once(&mock, &target(), Mode::Preview, &layout).unwrap();

        let default_tools = DesiredStateConfig::default().tools.len();
        assert_eq!(report.plan.tools_already_present.len(), default_tools);
        assert_eq!(fs::read_to_string(&layout.config_file).unwrap(), "{ not json");
    }
}
