//! Secrets configuration loaded from environment variables only.
//!
//! API keys are never stored in the TOML settings file.

use std::env;

use super::settings::LlmSettings;

/// Secrets loaded exclusively from environment variables.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    /// DashScope API key (env: DASHSCOPE_API_KEY)
    pub dashscope_api_key: Option<String>,

    /// OpenAI API key (env: OPENAI_API_KEY)
    pub openai_api_key: Option<String>,

    /// Key read from the variable named by `[llm].api_key_env`, if any
    pub custom_api_key: Option<String>,
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Secrets {
    /// Load secrets from environment variables, reading `.env` first.
    pub fn from_env(llm: &LlmSettings) -> Self {
        let _ = dotenvy::dotenv();
        Self::from_env_inner(llm)
    }

    /// Load from environment without touching `.env`.
    pub(crate) fn from_env_inner(llm: &LlmSettings) -> Self {
        let custom_api_key = llm
            .api_key_env
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .and_then(non_empty_var);

        Self {
            dashscope_api_key: non_empty_var("DASHSCOPE_API_KEY"),
            openai_api_key: non_empty_var("OPENAI_API_KEY"),
            custom_api_key,
        }
    }

    /// The key to use for the configured LLM backend.
    ///
    /// A key from `api_key_env` wins; otherwise the provider's default
    /// variable is used. A missing key is not an error here since only the
    /// LLM-backed routes need one.
    pub fn llm_api_key(&self, llm: &LlmSettings) -> Option<&str> {
        if let Some(key) = self.custom_api_key.as_deref() {
            return Some(key);
        }
        match llm.api_key_env() {
            "DASHSCOPE_API_KEY" => self.dashscope_api_key.as_deref(),
            "OPENAI_API_KEY" => self.openai_api_key.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_MUTEX;
    use crate::config::settings::LlmProvider;

    fn clear_env() {
        unsafe {
            env::remove_var("DASHSCOPE_API_KEY");
            env::remove_var("OPENAI_API_KEY");
            env::remove_var("D2Q_TEST_LLM_KEY");
        }
    }

    #[test]
    fn test_dashscope_key() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe { env::set_var("DASHSCOPE_API_KEY", "sk-dash") }

        let llm = LlmSettings::default();
        let secrets = Secrets::from_env_inner(&llm);
        assert_eq!(secrets.llm_api_key(&llm), Some("sk-dash"));
        assert!(secrets.openai_api_key.is_none());
    }

    #[test]
    fn test_openai_key_follows_provider() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("DASHSCOPE_API_KEY", "sk-dash");
            env::set_var("OPENAI_API_KEY", "sk-openai");
        }

        let llm = LlmSettings {
            provider: LlmProvider::OpenAi,
            ..LlmSettings::default()
        };
        let secrets = Secrets::from_env_inner(&llm);
        assert_eq!(secrets.llm_api_key(&llm), Some("sk-openai"));
    }

    #[test]
    fn test_custom_key_env_wins() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("DASHSCOPE_API_KEY", "sk-dash");
            env::set_var("D2Q_TEST_LLM_KEY", "sk-custom");
        }

        let llm = LlmSettings {
            api_key_env: Some("D2Q_TEST_LLM_KEY".to_string()),
            ..LlmSettings::default()
        };
        let secrets = Secrets::from_env_inner(&llm);
        assert_eq!(secrets.llm_api_key(&llm), Some("sk-custom"));
    }

    #[test]
    fn test_missing_key_is_none() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe { env::set_var("DASHSCOPE_API_KEY", "   ") }

        let llm = LlmSettings::default();
        let secrets = Secrets::from_env_inner(&llm);
        assert_eq!(secrets.llm_api_key(&llm), None);

        let custom = LlmSettings {
            api_key_env: Some("D2Q_TEST_LLM_KEY".to_string()),
            ..LlmSettings::default()
        };
        assert_eq!(Secrets::from_env_inner(&custom).llm_api_key(&custom), None);
    }
}
