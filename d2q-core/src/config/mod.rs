//! Configuration management for d2q.
//!
//! Secrets come from environment variables, everything else from a TOML
//! file.
//!
//! ## Secrets (Environment Variables)
//! - `DASHSCOPE_API_KEY` - DashScope (Qwen) API key
//! - `OPENAI_API_KEY` - OpenAI or OpenAI-compatible API key
//! - whatever `[llm].api_key_env` names
//!
//! ## Settings (TOML File)
//! Located at `~/.config/d2q/config.toml` (or `$D2Q_CONFIG_DIR/config.toml`):
//! ```toml
//! [gateway]
//! host = "0.0.0.0"
//! port = 8001
//!
//! [llm]
//! provider = "dashscope"
//! model = "qwen-long"
//!
//! [storage]
//! root = "."
//!
//! [logging]
//! level = "info"
//! ```

mod secrets;
mod settings;

use std::path::PathBuf;

pub use secrets::Secrets;
pub use settings::{
    GatewaySettings, LlmProvider, LlmSettings, LoggingSettings, Settings, SettingsError,
    StorageSettings,
};

/// Combined configuration containing both secrets and settings.
#[derive(Debug, Clone)]
pub struct Config {
    pub secrets: Secrets,
    pub settings: Settings,
}

/// Errors that can occur when loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Settings are read (and created with defaults if missing) first since
    /// they name the variable holding the LLM key.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Settings::load()?;
        let secrets = Secrets::from_env(&settings.llm);

        if secrets.llm_api_key(&settings.llm).is_none() {
            tracing::warn!(
                "{} is not set; document extraction and question generation will fail",
                settings.llm.api_key_env()
            );
        }

        Ok(Self { secrets, settings })
    }

    /// API key for the configured LLM backend (if any).
    pub fn llm_api_key(&self) -> Option<&str> {
        self.secrets.llm_api_key(&self.settings.llm)
    }

    /// Get the HTTP bind address.
    pub fn bind_addr(&self) -> String {
        self.settings.bind_addr()
    }

    pub fn data_dir(&self) -> PathBuf {
        self.settings.storage.data_path()
    }

    pub fn file_dir(&self) -> PathBuf {
        self.settings.storage.file_path()
    }
}

/// Load .env file if it exists (for development convenience).
///
/// `Config::load()` does this too; exported for binaries that need the
/// environment before configuration is loaded.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

// Tests that modify environment variables must not run concurrently
#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_config_accessors() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe {
            env::remove_var("OPENAI_API_KEY");
            env::set_var("DASHSCOPE_API_KEY", "sk-test");
        }

        let mut settings = Settings::default();
        settings.storage.root = PathBuf::from("/srv/d2q");
        let secrets = Secrets::from_env(&settings.llm);
        let config = Config { secrets, settings };

        assert_eq!(config.llm_api_key(), Some("sk-test"));
        assert_eq!(config.bind_addr(), "0.0.0.0:8001");
        assert_eq!(config.data_dir(), PathBuf::from("/srv/d2q/data"));
        assert_eq!(config.file_dir(), PathBuf::from("/srv/d2q/file"));

        unsafe { env::remove_var("DASHSCOPE_API_KEY") }
    }

    #[test]
    fn test_config_load_without_key() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        unsafe {
            env::set_var("D2Q_CONFIG_DIR", dir.path());
            env::remove_var("DASHSCOPE_API_KEY");
        }

        let config = Config::load().unwrap();

        unsafe { env::remove_var("D2Q_CONFIG_DIR") }
        assert_eq!(config.settings.gateway.port, 8001);
        assert!(dir.path().join("config.toml").exists());
    }
}
