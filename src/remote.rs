//! Mode-aware remote execution
//!
//! Every remote side effect goes through [`RemoteExecutor::run`] or
//! [`RemoteExecutor::copy`], which take the run's [`Mode`] explicitly. In
//! preview mode they print what would happen and return a synthesized
//! success without touching the transport. [`RemoteExecutor::probe`] is the
//! one read-only path and always reaches the host.

use sshkit::{CommandOutcome, RemoteCommand, Target, Transport};
use std::path::Path;

use crate::ui;

/// Whether a run mutates the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Apply,
    Preview,
}

impl Mode {
    pub fn from_preview_flag(preview: bool) -> Self {
        if preview { Self::Preview } else { Self::Apply }
    }

    pub fn is_preview(self) -> bool {
        self == Self::Preview
    }
}

/// Single execution primitive over a [`Transport`]
pub struct RemoteExecutor<'a> {
    transport: &'a dyn Transport,
}

impl<'a> RemoteExecutor<'a> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self { transport }
    }

    /// Run a mutating command, or describe it in preview mode
    pub fn run(&self, target: &Target, command: &RemoteCommand, mode: Mode) -> CommandOutcome {
        if mode.is_preview() {
            ui::would_run(command.as_str());
            return CommandOutcome::synthesized();
        }

        ui::remote_command(target.as_str(), command.as_str());
        self.exec(target, command)
    }

    /// Run a read-only command for real, whatever the mode
    pub fn probe(&self, target: &Target, command: &RemoteCommand) -> CommandOutcome {
        log::debug!("probe on {target}: {command}");
        self.exec(target, command)
    }

    /// Recursively copy a local path to the host, or describe it in preview mode
    pub fn copy(
        &self,
        target: &Target,
        local: &Path,
        remote: &str,
        preserve_mode: bool,
        mode: Mode,
    ) -> CommandOutcome {
        let local_display = local.display().to_string();

        if mode.is_preview() {
            ui::would_run(&format!("copy {local_display} -> {target}:{remote}"));
            return CommandOutcome::synthesized();
        }

        ui::remote_copy(target.as_str(), &local_display, remote);
        match self.transport.copy(target, local, remote, preserve_mode) {
            Ok(outcome) => outcome,
            Err(e) => transport_failure(&e),
        }
    }

    fn exec(&self, target: &Target, command: &RemoteCommand) -> CommandOutcome {
        match self.transport.exec(target, command.as_str()) {
            Ok(outcome) => outcome,
            Err(e) => transport_failure(&e),
        }
    }
}

/// Fold a failure to start ssh/scp into a failed outcome
fn transport_failure(error: &sshkit::Error) -> CommandOutcome {
    log::warn!("{error}");
    CommandOutcome {
        succeeded: false,
        stdout: String::new(),
        stderr: error.to_string(),
        exit_code: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sshkit::{Call, MockBackend, SshBackend};

    fn target() -> Target {
        Target::parse("gpu-box").unwrap()
    }

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(Mode::from_preview_flag(true), Mode::Preview);
        assert_eq!(Mode::from_preview_flag(false), Mode::Apply);
    }

    #[test]
    fn test_preview_run_never_reaches_transport() {
        let mock = MockBackend::new();
        mock.respond("rm -rf /tmp/x", CommandOutcome::failure(1, "nope"));
        let exec = RemoteExecutor::new(&mock);

        let outcome = exec.run(&target(), &RemoteCommand::shell("rm -rf /tmp/x"), Mode::Preview);

        assert!(outcome.succeeded);
        assert!(outcome.stdout.is_empty());
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_preview_copy_never_reaches_transport() {
        let mock = MockBackend::new();
        let exec = RemoteExecutor::new(&mock);

        let outcome = exec.copy(&target(), Path::new("home/.ssh"), "~/", true, Mode::Preview);

        assert!(outcome.succeeded);
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn test_apply_run_returns_transport_outcome() {
        let mock = MockBackend::new();
        mock.respond("false", CommandOutcome::failure(1, "boom"));
        let exec = RemoteExecutor::new(&mock);

        let outcome = exec.run(&target(), &RemoteCommand::shell("false"), Mode::Apply);

        assert!(!outcome.succeeded);
        assert_eq!(outcome.stderr, "boom");
        assert_eq!(mock.commands(), vec!["false".to_string()]);
    }

    #[test]
    fn test_apply_copy_passes_preserve_mode() {
        let mock = MockBackend::new();
        let exec = RemoteExecutor::new(&mock);

        exec.copy(&target(), Path::new("home/.ssh"), "~/", true, Mode::Apply);

        assert!(matches!(
            &mock.calls()[0],
            Call::Copy { preserve_mode: true, remote, .. } if remote == "~/"
        ));
    }

    #[test]
    fn test_probe_is_real_in_any_mode() {
        let mock = MockBackend::new();
        mock.respond("which foo", CommandOutcome::failure(1, ""));
        let exec = RemoteExecutor::new(&mock);

        let outcome = exec.probe(&target(), &RemoteCommand::shell("which foo"));

        assert!(!outcome.succeeded);
        assert_eq!(mock.commands(), vec!["which foo".to_string()]);
    }

    #[test]
    fn test_spawn_failure_becomes_failed_outcome() {
        let backend = SshBackend::new().with_programs("/nonexistent/ssh", "/nonexistent/scp");
        let exec = RemoteExecutor::new(&backend);

        let outcome = exec.run(&target(), &RemoteCommand::shell("true"), Mode::Apply);

        assert!(!outcome.succeeded);
        assert_eq!(outcome.exit_code, None);
        assert!(outcome.stderr.contains("/nonexistent/ssh"));
    }
}
