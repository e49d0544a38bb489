//! Configuration resolution
//!
//! Each setting resolves through the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file (`~/.config/cratematch/config.toml`)
//! 4. Compiled default (base URL only; the auth token has no default)

use cratematch_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Default matching-server base URL
pub const DEFAULT_API_URL: &str = "http://localhost:5001";
/// Default request timeout (seconds); SSE streams are exempt
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_API_URL: &str = "CRATEMATCH_API_URL";
pub const ENV_TOKEN: &str = "CRATEMATCH_TOKEN";

/// On-disk configuration file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub api_url: Option<String>,
    pub auth_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub auth_token: String,
    pub request_timeout: Duration,
}

/// Resolve configuration from CLI arguments, environment, and config file.
pub fn resolve(cli_api_url: Option<&str>, cli_token: Option<&str>) -> Result<Config> {
    let file = load_config_file();

    let api_url = pick(
        cli_api_url.map(str::to_string),
        std::env::var(ENV_API_URL).ok(),
        file.api_url.clone(),
    )
    .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let auth_token = pick(
        cli_token.map(str::to_string),
        std::env::var(ENV_TOKEN).ok(),
        file.auth_token.clone(),
    )
    .ok_or_else(|| {
        Error::Config(format!(
            "Auth token not configured. Please configure using one of:\n\
             1. CLI flag: --token <token>\n\
             2. Environment: {}=<token>\n\
             3. TOML config: {} (auth_token = \"<token>\")",
            ENV_TOKEN,
            config_file_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "~/.config/cratematch/config.toml".to_string()),
        ))
    })?;

    let timeout_secs = file.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);

    Ok(Config {
        api_url: api_url.trim_end_matches('/').to_string(),
        auth_token,
        request_timeout: Duration::from_secs(timeout_secs),
    })
}

/// First non-empty value in priority order: CLI → ENV → TOML
fn pick(cli: Option<String>, env: Option<String>, file: Option<String>) -> Option<String> {
    [cli, env, file]
        .into_iter()
        .flatten()
        .find(|v| !v.trim().is_empty())
}

/// Platform config file path (`<config dir>/cratematch/config.toml`)
fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cratematch").join("config.toml"))
}

fn load_config_file() -> TomlConfig {
    let Some(path) = config_file_path() else {
        return TomlConfig::default();
    };
    if !path.exists() {
        return TomlConfig::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                debug!(path = %path.display(), "Loaded config file");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unparseable config file");
                TomlConfig::default()
            }
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
            TomlConfig::default()
        }
    }
}
