//! Settings configuration loaded from TOML files.
//!
//! Non-sensitive configuration lives in the XDG config directory
//! (`~/.config/d2q/config.toml`) unless `D2Q_CONFIG_DIR` points elsewhere.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Default TOML configuration file content
const DEFAULT_CONFIG_TOML: &str = r#"# d2q configuration file
# Located at: ~/.config/d2q/config.toml
#
# This file contains non-sensitive configuration.
# Secrets (API keys) are loaded from environment variables:
#   - DASHSCOPE_API_KEY (provider = "dashscope")
#   - OPENAI_API_KEY (provider = "openai" or "openai_compatible")
#   - or the variable named by [llm].api_key_env

[gateway]
host = "0.0.0.0"
port = 8001

[llm]
# One of: dashscope, openai, openai_compatible
provider = "dashscope"
base_url = "https://dashscope.aliyuncs.com/compatible-mode/v1"
model = "qwen-long"
# api_key_env = "MY_LLM_KEY"
timeout_seconds = 120

[storage]
# data_dir and file_dir are resolved against root
root = "."
data_dir = "data"
file_dir = "file"

[logging]
level = "info"
file_enabled = false
# file_path = "logs/d2q.log"
# Write raw LLM requests and responses under ./logs/queries/
dump_queries = false
"#;

/// LLM backend kind.
///
/// All three speak the OpenAI-compatible wire format; they differ in the
/// default base URL and the environment variable holding the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    #[default]
    DashScope,
    OpenAi,
    OpenAiCompatible,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::DashScope => "dashscope",
            LlmProvider::OpenAi => "openai",
            LlmProvider::OpenAiCompatible => "openai_compatible",
        }
    }

    /// Environment variable the API key is read from by default.
    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            LlmProvider::DashScope => "DASHSCOPE_API_KEY",
            LlmProvider::OpenAi | LlmProvider::OpenAiCompatible => "OPENAI_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::DashScope => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            LlmProvider::OpenAi | LlmProvider::OpenAiCompatible => "https://api.openai.com/v1",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dashscope" | "qwen" => Ok(LlmProvider::DashScope),
            "openai" => Ok(LlmProvider::OpenAi),
            "openai_compatible" | "openai-compatible" | "openaicompatible" => {
                Ok(LlmProvider::OpenAiCompatible)
            }
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

fn deserialize_provider<'de, D>(deserializer: D) -> Result<LlmProvider, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    value.parse().map_err(serde::de::Error::custom)
}

fn serialize_provider<S>(provider: &LlmProvider, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(provider.as_str())
}

/// Main settings structure loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub gateway: GatewaySettings,

    #[serde(default)]
    pub llm: LlmSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewaySettings {
    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

/// LLM backend settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmSettings {
    #[serde(
        default,
        deserialize_with = "deserialize_provider",
        serialize_with = "serialize_provider"
    )]
    pub provider: LlmProvider,

    /// Falls back to the provider's default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Read the API key from this variable instead of the provider default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_llm_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl LlmSettings {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.provider.default_api_key_env())
    }
}

/// Where the JSON files and uploads are kept
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_file_dir")]
    pub file_dir: PathBuf,
}

impl StorageSettings {
    /// Data directory resolved against `root`.
    pub fn data_path(&self) -> PathBuf {
        self.root.join(&self.data_dir)
    }

    /// Upload directory resolved against `root`.
    pub fn file_path(&self) -> PathBuf {
        self.root.join(&self.file_dir)
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write logs to a file
    #[serde(default)]
    pub file_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// Dump raw LLM requests/responses to ./logs/queries/
    #[serde(default)]
    pub dump_queries: bool,
}

impl LoggingSettings {
    pub fn log_file_path(&self) -> PathBuf {
        self.file_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("logs").join("d2q.log"))
    }
}

// Default value functions

fn default_gateway_host() -> String {
    "0.0.0.0".to_string()
}

fn default_gateway_port() -> u16 {
    8001
}

fn default_llm_model() -> String {
    "qwen-long".to_string()
}

fn default_llm_timeout_seconds() -> u64 {
    120
}

fn default_storage_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_file_dir() -> PathBuf {
    PathBuf::from("file")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            base_url: None,
            model: default_llm_model(),
            api_key_env: None,
            timeout_seconds: default_llm_timeout_seconds(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            data_dir: default_data_dir(),
            file_dir: default_file_dir(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_enabled: false,
            file_path: None,
            dump_queries: false,
        }
    }
}

/// Errors that can occur when loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    ConfigDirNotFound,
}

impl Settings {
    /// Load settings from the TOML configuration file.
    ///
    /// If the config file doesn't exist, creates it with default values.
    pub fn load() -> Result<Self, SettingsError> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            tracing::info!("Creating default configuration at {:?}", config_path);
            Self::create_default_config(&config_path)?;
        }

        let content = fs::read_to_string(&config_path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(content)?;
        Ok(settings)
    }

    /// Serialize settings to TOML content.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Get the configuration file path.
    ///
    /// `$D2Q_CONFIG_DIR/config.toml` when set, else the XDG config directory.
    pub fn config_path() -> Result<PathBuf, SettingsError> {
        if let Ok(override_dir) = std::env::var("D2Q_CONFIG_DIR") {
            let dir = PathBuf::from(override_dir);
            return Ok(dir.join("config.toml"));
        }

        let config_dir = dirs::config_dir()
            .ok_or(SettingsError::ConfigDirNotFound)?
            .join("d2q");

        Ok(config_dir.join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG_TOML)?;
        Ok(())
    }

    /// Save settings to a specific file path.
    pub fn save_to_path(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = self.to_toml()?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the HTTP bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }
}
