//! Configuration: YAML file, then environment overrides, then the OS
//! keyring as a last resort for the access token.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{env, CONFIG_DIR_NAME, CONFIG_FILE_NAME};
use crate::error::ConfigError;
use crate::secure_storage::{SecureKey, SecureStorage};

/// Icon theme for the tray.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl FromStr for Theme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(ConfigError::InvalidTheme(other.to_string())),
        }
    }
}

/// On-disk shape. Every key is optional; validation happens after the
/// environment has been applied.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    pat: Option<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    theme: Option<String>,
}

#[derive(Clone)]
pub struct Config {
    /// Server host name without scheme, e.g. `chat.example.com`
    pub host: String,
    /// Personal access token
    pub token: String,
    pub theme: Theme,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .field("theme", &self.theme)
            .finish()
    }
}

impl Config {
    /// Load from `path` (or the default location), apply environment
    /// overrides and fall back to the keyring for a missing token.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        debug!(path = %path.display(), "Loading config");

        let file = read_config_file(&path)?;
        Self::resolve(
            file,
            |key| std::env::var(key).ok(),
            || SecureStorage::get(SecureKey::AccessToken).ok(),
        )
    }

    fn resolve(
        file: FileConfig,
        lookup_env: impl Fn(&str) -> Option<String>,
        keyring_token: impl FnOnce() -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let env_value = |key: &str| lookup_env(key).filter(|v| !v.is_empty());
        let non_empty = |v: Option<String>| v.filter(|v| !v.is_empty());

        let token = env_value(env::TOKEN)
            .or_else(|| non_empty(file.pat))
            .or_else(|| non_empty(keyring_token()))
            .ok_or(ConfigError::MissingToken)?;

        let host = env_value(env::HOST)
            .or_else(|| non_empty(file.host))
            .map(|h| normalize_host(&h))
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingHost)?;

        let theme = match env_value(env::THEME).or_else(|| non_empty(file.theme)) {
            Some(theme) => theme.parse()?,
            None => Theme::default(),
        };

        Ok(Self { host, token, theme })
    }
}

/// `$MM_TRAYWATCH_CONFIG`, else `<config dir>/mm-traywatch/config.yaml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    if let Some(path) = std::env::var_os(env::CONFIG_PATH).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// A missing file is an empty config.
fn read_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FileConfig::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Accept `https://host/` as well as `host`.
fn normalize_host(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("wss://"))
        .unwrap_or(raw);
    raw.trim_end_matches('/').to_string()
}
