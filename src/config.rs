//! Desired-state configuration
//!
//! The config file is JSON with the top-level keys `env_name`,
//! `python_version`, `conda_packages`, `pip_packages`, `conda_channels` and
//! `tools`. Loaded values override the built-in defaults key by key; a
//! missing file is materialized from the defaults so the first run documents
//! itself.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

use crate::ui;

/// Top-level keys recognised in the config file
pub const KNOWN_KEYS: &[&str] = &[
    "env_name",
    "python_version",
    "conda_packages",
    "pip_packages",
    "conda_channels",
    "tools",
];

static ENV_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid regex"));
static PYTHON_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9][0-9A-Za-z.*]*$").expect("valid regex"));
static PACKAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.\-\[\],<>=!~*+]+$").expect("valid regex"));
static CHANNEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.:/-]+$").expect("valid regex"));

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write default config to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// Types
// ============================================================================

/// How to detect and install one tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Read-only command whose success means "installed". Without one the
    /// tool is reinstalled on every run.
    #[serde(rename = "check", default, skip_serializing_if = "Option::is_none")]
    pub probe: Option<String>,

    /// Shell commands run in order to install the tool
    #[serde(rename = "install", default)]
    pub install_steps: Vec<String>,
}

impl ToolSpec {
    pub fn new(probe: Option<&str>, install_steps: &[&str]) -> Self {
        Self {
            probe: probe.map(str::to_string),
            install_steps: install_steps.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// The environment a host should end up with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredStateConfig {
    pub env_name: String,
    pub python_version: String,
    pub conda_packages: Vec<String>,
    pub pip_packages: Vec<String>,
    pub conda_channels: Vec<String>,
    pub tools: BTreeMap<String, ToolSpec>,
}

impl Default for DesiredStateConfig {
    fn default() -> Self {
        let mut tools = BTreeMap::new();
        tools.insert(
            "starship".to_string(),
            ToolSpec::new(
                Some("\"$HOME/.local/bin/starship\" --version"),
                &[
                    "mkdir -p \"$HOME/.local/bin\"",
                    "curl -sS https://starship.rs/install.sh | sh -s -- -y -b \"$HOME/.local/bin\"",
                ],
            ),
        );
        tools.insert(
            "fzf".to_string(),
            ToolSpec::new(
                Some("\"$HOME/.fzf/bin/fzf\" --version"),
                &[
                    "git clone --depth 1 https://github.com/junegunn/fzf.git \"$HOME/.fzf\"",
                    "\"$HOME/.fzf/install\" --key-bindings --completion --no-update-rc",
                ],
            ),
        );
        tools.insert(
            "zoxide".to_string(),
            ToolSpec::new(
                Some("\"$HOME/.local/bin/zoxide\" --version"),
                &["curl -sSfL https://raw.githubusercontent.com/ajeetdsouza/zoxide/main/install.sh | sh"],
            ),
        );

        Self {
            env_name: "dev".to_string(),
            python_version: "3.11".to_string(),
            conda_packages: vec!["numpy".into(), "pandas".into(), "ipython".into()],
            pip_packages: vec!["rich".into()],
            conda_channels: vec!["conda-forge".into(), "defaults".into()],
            tools,
        }
    }
}

/// Where the loaded config came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Defaults overridden by the file's keys
    File,
    /// No file existed; defaults were written to disk
    Materialized,
    /// The file was unusable; defaults were used and the file left alone
    Fallback { reason: String },
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: DesiredStateConfig,
    pub source: ConfigSource,
}

// ============================================================================
// Merge and validation
// ============================================================================

impl DesiredStateConfig {
    /// Shallow, top-level merge of overrides onto `defaults`
    ///
    /// Each recognised key in `overrides` replaces the default value
    /// wholesale; nested collections are not merged. Unknown keys are
    /// ignored. The result is validated.
    pub fn merge(defaults: &Self, overrides: &Map<String, Value>) -> Result<Self, ConfigError> {
        let mut base = match serde_json::to_value(defaults) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(ConfigError::Invalid("defaults are not an object".into())),
            Err(e) => return Err(ConfigError::Invalid(e.to_string())),
        };

        for (key, value) in overrides {
            if KNOWN_KEYS.contains(&key.as_str()) {
                base.insert(key.clone(), value.clone());
            } else {
                log::debug!("Ignoring unknown config key: {key}");
            }
        }

        let mut merged: Self = serde_json::from_value(Value::Object(base))
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        dedup_in_order(&mut merged.conda_packages);
        dedup_in_order(&mut merged.pip_packages);
        dedup_in_order(&mut merged.conda_channels);

        merged.validate()?;
        Ok(merged)
    }

    /// Check every token that ends up in a remote command line
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.env_name.trim().is_empty() {
            return Err(ConfigError::Invalid("env_name must not be empty".into()));
        }
        if self.python_version.trim().is_empty() {
            return Err(ConfigError::Invalid("python_version must not be empty".into()));
        }
        if !ENV_NAME_RE.is_match(&self.env_name) {
            return Err(ConfigError::Invalid(format!(
                "env_name '{}' contains unsupported characters",
                self.env_name
            )));
        }
        if !PYTHON_VERSION_RE.is_match(&self.python_version) {
            return Err(ConfigError::Invalid(format!(
                "python_version '{}' is not a version",
                self.python_version
            )));
        }

        for pkg in self.conda_packages.iter().chain(&self.pip_packages) {
            if !PACKAGE_RE.is_match(pkg) {
                return Err(ConfigError::Invalid(format!("package spec '{pkg}' is not allowed")));
            }
        }
        for channel in &self.conda_channels {
            if !CHANNEL_RE.is_match(channel) {
                return Err(ConfigError::Invalid(format!("channel '{channel}' is not allowed")));
            }
        }
        for (name, spec) in &self.tools {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid("tool names must not be empty".into()));
            }
            if spec.install_steps.iter().any(|s| s.trim().is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "tool '{name}' has an empty install step"
                )));
            }
        }

        Ok(())
    }
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}

// ============================================================================
// Loading
// ============================================================================

/// Load the config at `path`, falling back to or materializing defaults
pub fn load(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let defaults = DesiredStateConfig::default();

    if !path.exists() {
        persist(path, &defaults)?;
        log::info!("Wrote default config to {}", path.display());
        return Ok(LoadedConfig {
            config: defaults,
            source: ConfigSource::Materialized,
        });
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    match parse_and_merge(path, &content, &defaults) {
        Ok(config) => Ok(LoadedConfig {
            config,
            source: ConfigSource::File,
        }),
        Err(e) => {
            let reason = e.to_string();
            log::warn!("Falling back to default config: {reason}");
            ui::warn(&format!("Ignoring {} ({reason}); using defaults", path.display()));
            Ok(LoadedConfig {
                config: defaults,
                source: ConfigSource::Fallback { reason },
            })
        }
    }
}

fn parse_and_merge(
    path: &Path,
    content: &str,
    defaults: &DesiredStateConfig,
) -> Result<DesiredStateConfig, ConfigError> {
    let value: Value = serde_json::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Object(overrides) => DesiredStateConfig::merge(defaults, &overrides),
        _ => Err(ConfigError::Invalid("top level must be an object".into())),
    }
}

/// Write a config pretty-printed, creating parent directories
pub fn persist(path: &Path, config: &DesiredStateConfig) -> Result<(), ConfigError> {
    let to_err = |source| ConfigError::Persist {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(to_err)?;
    }

    let mut content = serde_json::to_string_pretty(config)
        .map_err(|e| to_err(std::io::Error::other(e)))?;
    content.push('\n');
    fs::write(path, content).map_err(to_err)
}
