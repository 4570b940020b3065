//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.chatnav/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ChatnavConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub push: PushConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Where auth state is persisted, relative to `~/.chatnav/` unless absolute.
    pub state_file: Option<String>,
    pub log_file: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    pub url: Option<String>,
    pub reconnect_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PushConfig {
    /// Fixed device token. A random one is generated when unset.
    pub registration_id: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;
pub const DEFAULT_STATE_FILE: &str = "state.json";
pub const DEFAULT_LOG_FILE: &str = "chatnav.log";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub server_url: String,
    pub reconnect_delay_ms: u64,
    pub state_file: Option<PathBuf>,
    pub log_file: String,
    pub registration_id: Option<String>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns `~/.chatnav/`.
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".chatnav"))
}

/// Returns the path to `~/.chatnav/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load config from `~/.chatnav/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `ChatnavConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<ChatnavConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(ChatnavConfig::default());
        }
    };
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<ChatnavConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(ChatnavConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: ChatnavConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# chatnav Configuration
# All settings are optional. Defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# state_file = "state.json"          # Relative to ~/.chatnav/
# log_file = "chatnav.log"

# [server]
# url = "http://localhost:8080"      # Or set CHATNAV_SERVER_URL env var
# reconnect_delay_ms = 1000

# [push]
# registration_id = "device-token"   # Or set CHATNAV_REGISTRATION_ID env var
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

pub const ENV_SERVER_URL: &str = "CHATNAV_SERVER_URL";
pub const ENV_REGISTRATION_ID: &str = "CHATNAV_REGISTRATION_ID";

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_server` and `cli_state_file` are from CLI flags (None = not specified).
pub fn resolve(
    config: &ChatnavConfig,
    cli_server: Option<&str>,
    cli_state_file: Option<&str>,
) -> ResolvedConfig {
    resolve_with_env(config, cli_server, cli_state_file, |key| {
        std::env::var(key).ok()
    })
}

/// [`resolve`] with environment lookups going through `env`.
pub fn resolve_with_env(
    config: &ChatnavConfig,
    cli_server: Option<&str>,
    cli_state_file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> ResolvedConfig {
    // Server URL: CLI → env → config → default
    let server_url = cli_server
        .map(|s| s.to_string())
        .or_else(|| env(ENV_SERVER_URL))
        .or_else(|| config.server.url.clone())
        .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

    // State file: CLI → config → default, relative paths under ~/.chatnav/
    let state_file = cli_state_file
        .map(|s| s.to_string())
        .or_else(|| config.general.state_file.clone())
        .unwrap_or_else(|| DEFAULT_STATE_FILE.to_string());
    let state_file = resolve_under_config_dir(&state_file);

    // Push token: env → config
    let registration_id =
        env(ENV_REGISTRATION_ID).or_else(|| config.push.registration_id.clone());

    ResolvedConfig {
        server_url,
        reconnect_delay_ms: config
            .server
            .reconnect_delay_ms
            .unwrap_or(DEFAULT_RECONNECT_DELAY_MS),
        state_file,
        log_file: config
            .general
            .log_file
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
        registration_id,
    }
}

fn resolve_under_config_dir(file: &str) -> Option<PathBuf> {
    let path = PathBuf::from(file);
    if path.is_absolute() {
        return Some(path);
    }
    config_dir().map(|dir| dir.join(path))
}
