mod cli;
mod config;
mod engine;
mod paths;
mod provision;
mod remote;
mod ui;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::Cli;
use sshkit::{SshBackend, Target};

use paths::ProjectLayout;
use remote::Mode;

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let target = Target::parse(&cli.host)?;
    let layout = ProjectLayout::resolve()?;
    log::debug!("project dir: {}", layout.root.display());
    let mode = Mode::from_preview_flag(cli.preview);

    let transport = SshBackend::new();
    if !transport.is_available() {
        bail!("ssh client not found on PATH");
    }

    let report = engine::run_once(&transport, &target, mode, &layout)
        .with_context(|| format!("Provisioning {target} failed"))?;

    if !report.is_success() {
        bail!("{} step(s) failed on {target}", report.failures.len());
    }

    Ok(())
}
