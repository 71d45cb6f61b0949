//! Configuration loading.
//!
//! Loads `~/.smack/config.toml` (or an explicit path). Environment
//! variables override file values; file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::kernel::audit::LogPolicy;
use crate::kernel::netlabel::{DEFAULT_CIPSO_DIRECT, DEFAULT_CIPSO_MAPPED};

// ── Top-level config ────────────────────────────────────────────

/// Top-level configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Decision auditing.
    pub audit: AuditConfig,
    /// CIPSO levels for network labels.
    pub netlabel: NetlabelConfig,
    /// Rule files and privilege settings.
    pub policy: PolicyConfig,
    /// Log file output.
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            audit: AuditConfig::default(),
            netlabel: NetlabelConfig::default(),
            policy: PolicyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Which decisions are audited and where records go.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Log policy: `none`, `denied`, `accept` or `both`.
    pub log: LogPolicy,
    /// Optional JSON Lines file receiving audit records.
    pub file: Option<PathBuf>,
}

/// CIPSO levels.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetlabelConfig {
    /// Level for directly mapped labels.
    pub cipso_direct: u32,
    /// Level for secid-mapped labels.
    pub cipso_mapped: u32,
}

impl Default for NetlabelConfig {
    fn default() -> Self {
        Self {
            cipso_direct: DEFAULT_CIPSO_DIRECT,
            cipso_mapped: DEFAULT_CIPSO_MAPPED,
        }
    }
}

/// Rule sources and privilege restriction.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Rule files loaded at startup, in order.
    pub rules: Vec<PathBuf>,
    /// Only tasks with this label may override denials.
    pub onlycap: Option<String>,
}

/// Structured log file output.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily-rotated JSON logs; stderr only when unset.
    pub dir: Option<PathBuf>,
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is
    /// an error. Environment overrides are applied afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => load_config(p)?,
            None => {
                let default_path = config_dir()?.join("config.toml");
                if default_path.exists() {
                    load_config(&default_path)?
                } else {
                    tracing::debug!("no config file found, using defaults");
                    Config::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function so tests do not touch the process env.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("SMACK_LOG_POLICY") {
            match v.parse() {
                Ok(policy) => self.audit.log = policy,
                Err(_) => tracing::warn!(
                    var = "SMACK_LOG_POLICY",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("SMACK_ONLYCAP") {
            self.policy.onlycap = if v.is_empty() { None } else { Some(v) };
        }
        if let Some(v) = env("SMACK_LOG_LEVEL") {
            self.log_level = v;
        }
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }
}

/// Load the configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config at {}", path.display()))
}

/// Resolve the default config directory (`~/.smack/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".smack"))
}
