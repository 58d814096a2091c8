//! OpenAI-compatible API client.
//!
//! DashScope's compatible mode speaks the same protocol, including the
//! `/files` endpoint used to hand documents to long-context models.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::providers::provider::{
    ChatMessage, Provider, ProviderError, ProviderResponse, ProviderUsage, ResponseFormat,
    UploadedFile,
};
use crate::providers::query_dump::{DEFAULT_QUERY_DIR, QueryDump};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// OpenAI-compatible API client.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    provider_name: String,
    dump_dir: Option<PathBuf>,
}

/// Request body for the Chat Completions API
#[derive(Debug, Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

/// OpenAI-compatible message format
#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

/// Choice in the response
#[derive(Debug, Deserialize)]
struct Choice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

/// Usage information
#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

fn body_preview(text: &str) -> &str {
    if text.len() > 500 {
        &text[..text.floor_char_boundary(500)]
    } else {
        text
    }
}

impl OpenAiCompatibleClient {
    /// Create a new OpenAI-compatible client.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        provider_name: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: build_http_client(DEFAULT_TIMEOUT)?,
            api_key,
            model: model.into(),
            base_url: base_url.into(),
            provider_name: provider_name.into(),
            dump_dir: None,
        })
    }

    /// Replace the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ProviderError> {
        self.http_client = build_http_client(timeout)?;
        Ok(self)
    }

    /// Enable or disable debug query logging
    pub fn with_dump_queries(mut self, enabled: bool) -> Self {
        self.dump_dir = enabled.then(|| PathBuf::from(DEFAULT_QUERY_DIR));
        self
    }

    /// Dump queries into `dir` instead of the default location.
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    /// Build request headers with optional auth.
    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            let auth_value = format!("Bearer {}", api_key);
            if let Ok(header_value) = HeaderValue::from_str(&auth_value) {
                headers.insert(AUTHORIZATION, header_value);
            }
        }
        headers
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{}/{}", base, path)
        } else {
            format!("{}/v1/{}", base, path)
        }
    }

    fn chat_completions_url(&self) -> String {
        self.endpoint("chat/completions")
    }

    fn files_url(&self) -> String {
        self.endpoint("files")
    }

    fn convert_messages(messages: Vec<ChatMessage>) -> Vec<OpenAiMessage> {
        messages
            .into_iter()
            .map(|msg| OpenAiMessage {
                role: msg.role.as_str().to_string(),
                content: Some(msg.content),
            })
            .collect()
    }

    fn convert_response(response: ChatCompletionsResponse) -> ProviderResponse {
        let choice = response.choices.into_iter().next();
        let stop_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());

        ProviderResponse {
            id: response.id,
            model: response.model,
            content: choice.and_then(|c| c.message.content),
            usage: response.usage.map(|u| ProviderUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
            stop_reason,
        }
    }

    async fn error_from(response: reqwest::Response) -> ProviderError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        ProviderError::ApiError { status, message }
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn upload_file(
        &self,
        path: &Path,
        purpose: &str,
    ) -> Result<UploadedFile, ProviderError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ProviderError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let size = bytes.len();

        let form = Form::new()
            .text("purpose", purpose.to_string())
            .part("file", Part::bytes(bytes).file_name(file_name.clone()));

        let response = self
            .http_client
            .post(self.files_url())
            .headers(self.build_headers())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let response_text = response.text().await?;
        let uploaded: UploadedFile = serde_json::from_str(&response_text).map_err(|e| {
            ProviderError::InvalidFormat(format!(
                "Failed to parse file upload response: {e}\nBody preview: {}",
                body_preview(&response_text)
            ))
        })?;

        info!(
            "Uploaded {} ({} bytes) to {} as {}",
            file_name, size, self.provider_name, uploaded.id
        );
        Ok(uploaded)
    }

    async fn send_conversation(
        &self,
        messages: Vec<ChatMessage>,
        response_format: ResponseFormat,
    ) -> Result<ProviderResponse, ProviderError> {
        let request_body = ChatCompletionsRequest {
            model: &self.model,
            messages: Self::convert_messages(messages),
            response_format: match response_format {
                ResponseFormat::Text => None,
                ResponseFormat::JsonObject => Some(serde_json::json!({"type": "json_object"})),
            },
        };

        let dump = match (&self.dump_dir, serde_json::to_value(&request_body)) {
            (Some(dir), Ok(val)) => {
                QueryDump::request(dir, &self.provider_name, &self.model, &val).await
            }
            _ => None,
        };

        debug!(
            "Sending {} messages to {}/{}",
            request_body.messages.len(),
            self.provider_name,
            self.model
        );
        let response = self
            .http_client
            .post(self.chat_completions_url())
            .headers(self.build_headers())
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let response_text = response.text().await?;

        if let Some(dump) = &dump {
            if let Ok(val) = serde_json::from_str::<Value>(&response_text) {
                dump.response(&val).await;
            }
        }

        let completions_response: ChatCompletionsResponse = serde_json::from_str(&response_text)
            .map_err(|e| {
                ProviderError::InvalidFormat(format!(
                    "Failed to parse OpenAI-compatible response: {e}\nBody preview: {}",
                    body_preview(&response_text)
                ))
            })?;
        Ok(Self::convert_response(completions_response))
    }

    fn clone_box(&self) -> Box<dyn Provider> {
        Box::new(self.clone())
    }
}
