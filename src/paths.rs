//! Local project layout
//!
//! Everything hostprep reads or writes locally lives under one project
//! directory:
//!
//! - `config.json` - desired state, materialized with defaults on first run
//! - `home/` - staging tree mirrored to the remote home directory
//! - `.gitignore` - gets `home/` appended so staged secrets stay untracked
//!
//! # Environment Variables
//!
//! - `HOSTPREP_DIR` - Override the project directory (default: current dir)

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for project directory override
pub const ENV_PROJECT_DIR: &str = "HOSTPREP_DIR";

pub const CONFIG_FILE: &str = "config.json";
pub const HOME_DIR: &str = "home";
pub const IGNORE_FILE: &str = ".gitignore";

/// Resolved local paths for one run
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub config_file: PathBuf,
    pub home_dir: PathBuf,
    pub ignore_file: PathBuf,
}

impl ProjectLayout {
    /// Layout rooted at an explicit directory
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            config_file: root.join(CONFIG_FILE),
            home_dir: root.join(HOME_DIR),
            ignore_file: root.join(IGNORE_FILE),
            root,
        }
    }

    /// Resolve the project directory
    ///
    /// Priority:
    /// 1. `HOSTPREP_DIR` env var
    /// 2. Current working directory
    pub fn resolve() -> Result<Self> {
        if let Ok(dir) = std::env::var(ENV_PROJECT_DIR) {
            let path = expand_path(&dir);
            log::debug!("Using project dir from {}: {}", ENV_PROJECT_DIR, path.display());
            return Ok(Self::at(path));
        }

        let cwd = std::env::current_dir().context("Could not determine current directory")?;
        log::debug!("Using current directory as project dir: {}", cwd.display());
        Ok(Self::at(cwd))
    }

    /// Staging path as it should appear in the ignore file
    pub fn home_ignore_entry(&self) -> String {
        format!("{HOME_DIR}/")
    }
}

/// Expand `~` and environment variables in a path
pub fn expand_path(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).map_or_else(
        |_| shellexpand::tilde(path).into_owned(),
        std::borrow::Cow::into_owned,
    );
    PathBuf::from(expanded)
}
