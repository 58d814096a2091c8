//! Shared helpers for integration tests.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use d2q_gateway::providers::{
    ChatMessage, Provider, ProviderError, ProviderResponse, ResponseFormat, UploadedFile,
};
use d2q_gateway::server::create_router;
use d2q_gateway::state::AppState;
use d2q_store::Store;
use d2q_store::test_helpers::create_test_store;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

/// One `send_conversation` call as the mock saw it
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<ChatMessage>,
    pub response_format: ResponseFormat,
}

#[derive(Default)]
struct MockLog {
    replies: VecDeque<String>,
    uploads: Vec<PathBuf>,
    calls: Vec<RecordedCall>,
}

/// Provider that answers from a queue of canned replies.
#[derive(Clone, Default)]
pub struct MockProvider {
    log: Arc<Mutex<MockLog>>,
}

#[allow(dead_code)]
impl MockProvider {
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::default();
        provider
            .log
            .lock()
            .unwrap()
            .replies
            .extend(replies.into_iter().map(Into::into));
        provider
    }

    pub fn uploads(&self) -> Vec<PathBuf> {
        self.log.lock().unwrap().uploads.clone()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.log.lock().unwrap().calls.clone()
    }
}

#[async_trait::async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-long"
    }

    async fn upload_file(
        &self,
        path: &Path,
        _purpose: &str,
    ) -> Result<UploadedFile, ProviderError> {
        let mut log = self.log.lock().unwrap();
        log.uploads.push(path.to_path_buf());
        Ok(UploadedFile {
            id: format!("file-mock-{}", log.uploads.len()),
            filename: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            bytes: None,
        })
    }

    async fn send_conversation(
        &self,
        messages: Vec<ChatMessage>,
        response_format: ResponseFormat,
    ) -> Result<ProviderResponse, ProviderError> {
        let mut log = self.log.lock().unwrap();
        log.calls.push(RecordedCall {
            messages,
            response_format,
        });
        let content = log.replies.pop_front().ok_or(ProviderError::NoContent)?;
        Ok(ProviderResponse {
            id: format!("chatcmpl-mock-{}", log.calls.len()),
            model: "mock-long".to_string(),
            content: Some(content),
            usage: None,
            stop_reason: Some("stop".to_string()),
        })
    }

    fn clone_box(&self) -> Box<dyn Provider> {
        Box::new(self.clone())
    }
}

/// Router over a fresh temporary store
#[allow(dead_code)]
pub struct TestApp {
    pub router: Router,
    pub store: Store,
    _dir: TempDir,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new(provider: Option<MockProvider>) -> Self {
        let (dir, store) = create_test_store().await.expect("create test store");
        let provider = provider.map(|p| Arc::new(p) as Arc<dyn Provider>);
        let state = Arc::new(AppState::new(store.clone(), provider));
        Self {
            router: create_router(state),
            store,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        // Non-JSON bodies come back as a string so tests can assert on them
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// POST a multipart form of `(field, file name, content)` file parts and
    /// `(field, value)` text parts.
    pub async fn post_multipart(
        &self,
        uri: &str,
        files: &[(&str, &str, &str)],
        texts: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        const BOUNDARY: &str = "d2q-test-boundary";
        let mut body = Vec::new();
        for (field, file_name, content) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(content.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        for (field, value) in texts {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }
}
