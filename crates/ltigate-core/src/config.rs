//! Configuration resolution for ltigate.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/ltigate/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Complete ltigate configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub launch: LaunchConfig,
    #[serde(default)]
    pub keyset: KeySetConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// How deployment identifiers seen during a launch are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentPolicy {
    /// Create the deployment the first time its identifier is observed.
    #[default]
    Upsert,
    /// Only accept deployments that were registered ahead of time.
    RequireExisting,
}

impl FromStr for DeploymentPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "upsert" => Ok(Self::Upsert),
            "require_existing" => Ok(Self::RequireExisting),
            other => Err(Error::Config(format!(
                "Unknown deployment policy '{other}' (expected 'upsert' or 'require_existing')"
            ))),
        }
    }
}

/// Launch protocol configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Issuer written into (and required from) state tokens.
    pub issuer: String,
    /// Shared secret used to sign state tokens (HS256).
    pub state_secret: String,
    /// Tool callback URL sent to the platform as `redirect_uri`.
    pub redirect_uri: String,
    pub deployment_policy: DeploymentPolicy,
    /// Clock skew tolerated when checking identity token `exp`/`nbf` (seconds).
    pub id_token_leeway_secs: u64,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            state_secret: String::new(),
            redirect_uri: String::new(),
            deployment_policy: DeploymentPolicy::Upsert,
            id_token_leeway_secs: 60,
        }
    }
}

/// Platform key set cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySetConfig {
    /// How long a fetched key set is served before it is fetched again.
    pub ttl_secs: u64,
    /// Timeout for a single key set fetch.
    pub fetch_timeout_secs: u64,
    /// Interval of the background refresh of all known key sets (0 disables it).
    pub refresh_interval_secs: u64,
}

impl Default for KeySetConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 15 * 60,
            fetch_timeout_secs: 10,
            refresh_interval_secs: 60 * 60,
        }
    }
}

/// Process-level settings used by the `ltigate` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub database_path: Option<PathBuf>,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:9000".to_string(),
            database_path: None,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    /// Check that everything the launch engine needs is present.
    pub fn validate(&self) -> Result<()> {
        if self.launch.issuer.is_empty() {
            return Err(Error::Config("launch.issuer must be set".to_string()));
        }
        if self.launch.state_secret.is_empty() {
            return Err(Error::Config("launch.state_secret must be set".to_string()));
        }
        if self.launch.redirect_uri.is_empty() {
            return Err(Error::Config("launch.redirect_uri must be set".to_string()));
        }
        if self.keyset.fetch_timeout_secs == 0 {
            return Err(Error::Config(
                "keyset.fetch_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(config_file: Option<&Path>) -> Result<Config> {
    let mut layers = Vec::new();
    if let Some(global_path) = global_config_path()
        && global_path.exists()
    {
        layers.push(global_path);
    }
    if let Some(path) = config_file {
        layers.push(path.to_path_buf());
    }

    let mut config = resolve_files(&layers)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Layer config files over the defaults, later files winning. A file only
/// overrides the keys it actually contains.
fn resolve_files(paths: &[PathBuf]) -> Result<Config> {
    let mut merged = serde_json::to_value(Config::default())
        .map_err(|e| Error::Config(format!("Failed to encode default config: {e}")))?;
    for path in paths {
        merge_json(&mut merged, load_config_file(path)?);
    }
    serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    data_dir().map(|d| d.join("settings.json"))
}

/// Get the default database path.
pub fn database_path() -> Option<PathBuf> {
    data_dir().map(|d| d.join("launch.db"))
}

fn data_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ltigate"))
}

fn load_config_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })?;
    if !value.is_object() {
        return Err(Error::Config(format!(
            "Config file {} must contain a JSON object",
            path.display()
        )));
    }
    Ok(value)
}

/// Recursively merge `overlay` into `base`. Objects merge key by key, `null`
/// leaves the base untouched, anything else replaces it.
fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (_, Value::Null) => {}
        (slot, value) => *slot = value,
    }
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(val) = var("LTIGATE_ISSUER") {
        config.launch.issuer = val;
    }
    if let Some(val) = var("LTIGATE_STATE_SECRET") {
        config.launch.state_secret = val;
    }
    if let Some(val) = var("LTIGATE_REDIRECT_URI") {
        config.launch.redirect_uri = val;
    }
    if let Some(val) = var("LTIGATE_DEPLOYMENT_POLICY") {
        config.launch.deployment_policy = val.parse()?;
    }
    if let Some(val) = var("LTIGATE_KEYSET_TTL_SECS") {
        config.keyset.ttl_secs = val.parse().map_err(|e| {
            Error::Config(format!("Invalid LTIGATE_KEYSET_TTL_SECS '{val}': {e}"))
        })?;
    }
    if let Some(val) = var("LTIGATE_DATABASE_PATH") {
        config.server.database_path = Some(PathBuf::from(val));
    }
    if let Some(val) = var("LTIGATE_LOG_LEVEL") {
        config.server.log_level = val;
    }
    Ok(())
}
