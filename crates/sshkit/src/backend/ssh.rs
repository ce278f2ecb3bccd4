//! OpenSSH backend using the `ssh` and `scp` programs.

use crate::backend::Transport;
use crate::error::{Error, Result};
use crate::types::{CommandOutcome, Target};
use std::path::Path;
use std::process::{Command, Stdio};

/// Options passed to every ssh/scp invocation.
///
/// `BatchMode` makes ssh fail instead of prompting: provisioning relies on
/// key trust already being in place.
const DEFAULT_OPTIONS: &[&str] = &["-o", "BatchMode=yes", "-o", "ConnectTimeout=15"];

/// Backend that shells out to the local OpenSSH client.
pub struct SshBackend {
    ssh_program: String,
    scp_program: String,
    options: Vec<String>,
}

impl SshBackend {
    /// Create a backend using `ssh`/`scp` from `$PATH`.
    pub fn new() -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
            options: DEFAULT_OPTIONS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Use specific programs instead of the ones on `$PATH`.
    pub fn with_programs(mut self, ssh: impl Into<String>, scp: impl Into<String>) -> Self {
        self.ssh_program = ssh.into();
        self.scp_program = scp.into();
        self
    }

    /// Check whether the ssh client can be started.
    pub fn is_available(&self) -> bool {
        Command::new(&self.ssh_program)
            .arg("-V")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    /// Arguments for an exec call, excluding the program.
    fn exec_args<'a>(&'a self, target: &'a Target, command: &'a str) -> Vec<&'a str> {
        let mut args: Vec<&str> = self.options.iter().map(String::as_str).collect();
        // `--` stops option parsing even though Target already rejects '-'
        args.extend(["--", target.as_str(), command]);
        args
    }

    /// Arguments for a copy call, excluding the program.
    fn copy_args(&self, target: &Target, local: &Path, remote: &str, preserve_mode: bool) -> Vec<String> {
        let mut args: Vec<String> = self.options.clone();
        args.push("-r".to_string());
        if preserve_mode {
            args.push("-p".to_string());
        }
        args.push("--".to_string());
        args.push(local.display().to_string());
        args.push(scp_destination(target, remote));
        args
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutcome> {
        log::debug!("{} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::Spawn {
                program: program.to_string(),
                source,
            })?;
        Ok(output.into())
    }
}

/// `host:path` operand for scp, bracketing IPv6 literals.
///
/// scp splits its operand at the first `:`, so `::1:~/` would be read as a
/// local path.
fn scp_destination(target: &Target, remote: &str) -> String {
    let raw = target.as_str();
    let (user, host) = match raw.rsplit_once('@') {
        Some((user, host)) => (Some(user), host),
        None => (None, raw),
    };

    let host = if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_string()
    };

    match user {
        Some(user) => format!("{user}@{host}:{remote}"),
        None => format!("{host}:{remote}"),
    }
}

impl Default for SshBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SshBackend {
    fn exec(&self, target: &Target, command: &str) -> Result<CommandOutcome> {
        let args = self.exec_args(target, command);
        self.run(&self.ssh_program, &args)
    }

    fn copy(
        &self,
        target: &Target,
        local: &Path,
        remote: &str,
        preserve_mode: bool,
    ) -> Result<CommandOutcome> {
        let args = self.copy_args(target, local, remote, preserve_mode);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&self.scp_program, &args)
    }
}
