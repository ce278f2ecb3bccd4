//! Local staging directory and its sync to the remote home
//!
//! `home/` in the project directory mirrors what should land in `~` on the
//! host. A few entries get special handling after the copy:
//!
//! - `.ssh` keeps its modes and is then locked down to `700`/`600`
//! - `bin` has every file marked executable
//!
//! Everything else that starts with a dot is copied as-is, in name order.

use anyhow::{Context, Result};
use sshkit::RemoteCommand;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::DesiredStateConfig;
use crate::engine::steps::StepRunner;
use crate::paths::ProjectLayout;
use crate::ui;

use super::shellrc;

const REMOTE_HOME: &str = "~/";

const SSH_DIR: &str = ".ssh";
const BIN_DIR: &str = "bin";
const CONFIG_DIR: &str = ".config";

/// Write the generated `.bashrc` into the staging directory
pub fn stage_shell_rc(layout: &ProjectLayout, config: &DesiredStateConfig) -> Result<PathBuf> {
    fs::create_dir_all(&layout.home_dir)
        .with_context(|| format!("Failed to create {}", layout.home_dir.display()))?;

    let path = layout.home_dir.join(".bashrc");
    fs::write(&path, shellrc::render_bashrc(config))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::debug!("Staged {}", path.display());
    Ok(path)
}

/// Append `entry` to the ignore file unless a line already matches it
///
/// Returns whether the file was changed.
pub fn ensure_ignored(ignore_file: &Path, entry: &str) -> Result<bool> {
    let existing = match fs::read_to_string(ignore_file) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", ignore_file.display()));
        }
    };

    let bare = entry.trim_end_matches('/');
    if existing
        .lines()
        .map(str::trim)
        .any(|line| line == entry || line == bare)
    {
        return Ok(false);
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(ignore_file)
        .with_context(|| format!("Failed to open {}", ignore_file.display()))?;

    let separator = if existing.is_empty() || existing.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    writeln!(file, "{separator}{entry}")
        .with_context(|| format!("Failed to write {}", ignore_file.display()))?;
    Ok(true)
}

/// Dot-entries of the staging dir other than `.ssh` and `.config`, sorted
fn other_dotfiles(home_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(home_dir)
        .with_context(|| format!("Failed to read {}", home_dir.display()))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read {}", home_dir.display()))?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') && name != SSH_DIR && name != CONFIG_DIR {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

fn ssh_permissions_command() -> RemoteCommand {
    RemoteCommand::shell("chmod 700 \"$HOME/.ssh\"")
        .and(RemoteCommand::shell("find \"$HOME/.ssh\" -type f -exec chmod 600 {} +"))
}

fn bin_permissions_command() -> RemoteCommand {
    RemoteCommand::shell("find \"$HOME/bin\" -type f -exec chmod +x {} +")
}

/// Copy the staging directory to the remote home
pub fn sync(steps: &mut StepRunner, home_dir: &Path) -> Result<()> {
    if !home_dir.is_dir() {
        ui::dim(&format!("No {} directory, nothing to sync", home_dir.display()));
        return Ok(());
    }

    let ssh = home_dir.join(SSH_DIR);
    if ssh.is_dir() {
        steps.copy("home:.ssh", &ssh, REMOTE_HOME, true);
        // copied modes are whatever the local checkout had
        steps.run("home:.ssh:permissions", &ssh_permissions_command());
    }

    let bin = home_dir.join(BIN_DIR);
    if bin.is_dir() {
        steps.copy("home:bin", &bin, REMOTE_HOME, false);
        steps.run("home:bin:permissions", &bin_permissions_command());
    }

    let config = home_dir.join(CONFIG_DIR);
    if config.is_dir() {
        steps.copy("home:.config", &config, REMOTE_HOME, false);
    }

    for path in other_dotfiles(home_dir)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        steps.copy(&format!("home:{name}"), &path, REMOTE_HOME, false);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{Mode, RemoteExecutor};
    use sshkit::{Call, MockBackend, Target};
    use tempfile::TempDir;

    fn target() -> Target {
        Target::parse("gpu-box").unwrap()
    }

    fn copied(mock: &MockBackend) -> Vec<(String, bool)> {
        mock.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Copy {
                    local,
                    preserve_mode,
                    ..
                } => Some((
                    local.file_name().unwrap().to_string_lossy().into_owned(),
                    preserve_mode,
                )),
                Call::Exec { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_stage_shell_rc() {
        let temp = TempDir::new().unwrap();
        let layout = ProjectLayout::at(temp.path());

        let path = stage_shell_rc(&layout, &DesiredStateConfig::default()).unwrap();

        assert_eq!(path, temp.path().join("home/.bashrc"));
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("alias act='conda activate dev'"));
    }

    #[test]
    fn test_ensure_ignored_creates_and_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let ignore = temp.path().join(".gitignore");

        assert!(ensure_ignored(&ignore, "home/").unwrap());
        assert!(!ensure_ignored(&ignore, "home/").unwrap());
        assert_eq!(fs::read_to_string(&ignore).unwrap(), "home/\n");
    }

    #[test]
    fn test_ensure_ignored_appends_after_unterminated_line() {
        let temp = TempDir::new().unwrap();
        let ignore = temp.path().join(".gitignore");
        fs::write(&ignore, "target").unwrap();

        assert!(ensure_ignored(&ignore, "home/").unwrap());
        assert_eq!(fs::read_to_string(&ignore).unwrap(), "target\nhome/\n");
    }

    #[test]
    fn test_ensure_ignored_accepts_bare_entry() {
        let temp = TempDir::new().unwrap();
        let ignore = temp.path().join(".gitignore");
        fs::write(&ignore, "home\n").unwrap();

        assert!(!ensure_ignored(&ignore, "home/").unwrap());
    }

    #[test]
    fn test_sync_order_and_permissions() {
        let temp = TempDir::new().unwrap();
        let home = temp.path();
        fs::create_dir_all(home.join(".ssh")).unwrap();
        fs::write(home.join(".ssh/id_ed25519"), "key").unwrap();
        fs::create_dir_all(home.join("bin")).unwrap();
        fs::write(home.join("bin/tool"), "#!/bin/sh\n").unwrap();
        fs::create_dir_all(home.join(".config/nvim")).unwrap();
        fs::write(home.join(".vimrc"), "").unwrap();
        fs::write(home.join(".bashrc"), "").unwrap();
        fs::write(home.join("notes.txt"), "").unwrap();

        let mock = MockBackend::new();
        let exec = RemoteExecutor::new(&mock);
        let target = target();
        let mut steps = StepRunner::new(&exec, &target, Mode::Apply);

        sync(&mut steps, home).unwrap();

        assert_eq!(
            copied(&mock),
            vec![
                (".ssh".to_string(), true),
                ("bin".to_string(), false),
                (".config".to_string(), false),
                (".bashrc".to_string(), false),
                (".vimrc".to_string(), false),
            ]
        );
        assert_eq!(
            mock.commands(),
            vec![
                ssh_permissions_command().to_string(),
                bin_permissions_command().to_string(),
            ]
        );
    }

    #[test]
    fn test_ssh_permissions_run_even_when_copy_fails() {
        let temp = TempDir::new().unwrap();
        let ssh = temp.path().join(".ssh");
        fs::create_dir_all(&ssh).unwrap();

        let mock = MockBackend::new();
        mock.fail_copy(&ssh);
        let exec = RemoteExecutor::new(&mock);
        let target = target();
        let mut steps = StepRunner::new(&exec, &target, Mode::Apply);

        sync(&mut steps, temp.path()).unwrap();

        assert_eq!(steps.failures().len(), 1);
        assert_eq!(steps.failures()[0].step, "home:.ssh");
        let commands = mock.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0],
            "chmod 700 \"$HOME/.ssh\" && find \"$HOME/.ssh\" -type f -exec chmod 600 {} +"
        );
    }

    #[test]
    fn test_missing_staging_dir_is_skipped() {
        let temp = TempDir::new().unwrap();
        let mock = MockBackend::new();
        let exec = RemoteExecutor::new(&mock);
        let target = target();
        let mut steps = StepRunner::new(&exec, &target, Mode::Apply);

        sync(&mut steps, &temp.path().join("home")).unwrap();

        assert!(mock.calls().is_empty());
    }
}
