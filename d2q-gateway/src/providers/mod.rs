pub mod openai_compatible;
pub mod provider;
pub mod query_dump;

use std::sync::Arc;
use std::time::Duration;

use d2q_core::{LlmSettings, LoggingSettings};
use tracing::info;

pub use openai_compatible::OpenAiCompatibleClient;
pub use provider::{
    ChatMessage, ChatRole, Provider, ProviderError, ProviderResponse, ProviderUsage,
    ResponseFormat, UploadedFile, extract_text,
};

/// Build the client for the configured backend.
///
/// Every supported backend speaks the OpenAI-compatible protocol; they differ
/// only in base URL and the variable holding the key.
pub fn build_provider(
    llm: &LlmSettings,
    logging: &LoggingSettings,
    api_key: &str,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let client = OpenAiCompatibleClient::new(
        llm.base_url(),
        Some(api_key.to_string()),
        &llm.model,
        llm.provider.as_str(),
    )?
    .with_timeout(Duration::from_secs(llm.timeout_seconds))?
    .with_dump_queries(logging.dump_queries);

    info!(
        "LLM client created: {} at {} with model {}",
        llm.provider,
        llm.base_url(),
        llm.model
    );
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_provider_uses_settings() {
        let llm = LlmSettings {
            model: "qwen-plus".to_string(),
            ..LlmSettings::default()
        };
        let provider = build_provider(&llm, &LoggingSettings::default(), "sk-test").unwrap();
        assert_eq!(provider.name(), "dashscope");
        assert_eq!(provider.model(), "qwen-plus");
    }
}
