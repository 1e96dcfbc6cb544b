use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub channel_token: String,
    #[serde(default)]
    pub channel_secret: String,
    /// Trimmed text that turns an input into a help request. Empty disables it.
    #[serde(default = "default_help_command")]
    pub help_command: String,
    /// Trimmed text that aborts the current conversational context. Empty disables it.
    #[serde(default = "default_abort_command")]
    pub abort_command: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    #[serde(default)]
    pub client: ClientOptions,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// Options handed through to [`crate::client::LineClient`] on construction.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ClientOptions {
    /// Base URL of the Messaging API.
    #[serde(default = "default_api_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            endpoint: default_api_endpoint(),
            user_agent: None,
        }
    }
}

fn default_help_command() -> String {
    ".help".to_string()
}

fn default_abort_command() -> String {
    ".abort".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_endpoint() -> String {
    "/callback".to_string()
}

fn default_api_endpoint() -> String {
    "https://api.line.me".to_string()
}

impl Default for Config {
    /// Default settings with empty credentials. Fill the credentials in
    /// directly or load them with [`Config::load`].
    fn default() -> Self {
        Self {
            channel_token: String::new(),
            channel_secret: String::new(),
            help_command: default_help_command(),
            abort_command: default_abort_command(),
            port: default_port(),
            endpoint: default_endpoint(),
            tls: None,
            client: ClientOptions::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Invalid TOML configuration")?;

        crate::server::validate_callback_path(&config.endpoint)?;

        Ok(config)
    }
}
