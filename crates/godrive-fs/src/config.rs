//! Application configuration.
//!
//! One TOML file holds everything: log filter, HTTP timeout, OAuth
//! credentials and the mountpoint map. `init` writes a commented starter
//! file for the user to fill in.

use std::path::{Path, PathBuf};
use std::time::Duration;

use gdrive::auth::Credentials;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use crate::mount::Mountpoints;

/// File name under the configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config file {0} already exists, leaving it alone")]
    AlreadyExists(PathBuf),
    #[error("no configuration directory could be determined")]
    NoConfigDir,
    #[error("no credentials configured: set auth.access_token, or auth.client_id, auth.client_secret and auth.refresh_token")]
    MissingCredentials,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Tracing filter directive, e.g. `info` or `godrive_fs=debug`.
    #[serde(default)]
    pub log_filter: Option<String>,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Local directory → remote Drive path.
    #[serde(default)]
    pub mountpoints: Mountpoints,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    /// Per-request timeout in seconds, covering every Drive call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HttpConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// A ready access token. Takes precedence when set.
    #[serde(default)]
    pub access_token: Option<SecretString>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<SecretString>,
    #[serde(default)]
    pub refresh_token: Option<SecretString>,
}

impl AuthConfig {
    /// Turn the configured fields into client credentials.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        if let Some(token) = &self.access_token {
            return Ok(Credentials::AccessToken(token.clone()));
        }
        match (&self.client_id, &self.client_secret, &self.refresh_token) {
            (Some(id), Some(secret), Some(refresh)) => Ok(Credentials::Refresh {
                client_id: id.clone(),
                client_secret: secret.clone(),
                refresh_token: refresh.clone(),
            }),
            _ => Err(ConfigError::MissingCredentials),
        }
    }
}

impl Config {
    /// The default config path: `<config dir>/godrive-fuse/config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("godrive-fuse").join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load and parse the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Write the starter file at `path`, refusing to clobber an existing
    /// one. Parent directories are created as needed.
    pub fn write_template(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_owned()));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, TEMPLATE)?;
        Ok(())
    }
}

/// The starter config written by `init`.
const TEMPLATE: &str = r#"# godrive-fuse configuration

# Minimal level of log lines to keep. Any tracing filter directive works:
# "debug", "info", "warn", "error", or e.g. "godrive_fs=debug".
# Default is "info".
#log_filter = "info"

[http]
# Timeout in seconds applied to every Drive API request.
#timeout_secs = 5

[auth]
# Either a ready OAuth access token (expires after about an hour):
#access_token = ""
# ... or an offline grant, which mints access tokens as needed:
#client_id = ""
#client_secret = ""
#refresh_token = ""

[mountpoints]
# Local directory = remote Drive path. Environment variables in the local
# path are expanded. Mounting the Drive root ("/") is not supported.
#"$HOME/drive/backup" = "/backup"
"#;
