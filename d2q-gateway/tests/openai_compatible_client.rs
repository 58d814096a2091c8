//! OpenAI-compatible client against a mock HTTP server.

use std::time::Duration;

use d2q_gateway::providers::{
    ChatMessage, OpenAiCompatibleClient, Provider, ProviderError, ResponseFormat,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> OpenAiCompatibleClient {
    OpenAiCompatibleClient::new(
        server.uri(),
        Some("sk-test".to_string()),
        "qwen-long",
        "dashscope",
    )
    .unwrap()
}

fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-123",
        "model": "qwen-long",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 7, "total_tokens": 19}
    })
}

#[tokio::test]
async fn test_send_conversation_requests_json_object() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "qwen-long",
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": "fileid://file-fe-1"},
                {"role": "user", "content": "Give me questions"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"questions\": []}")))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .send_conversation(
            vec![
                ChatMessage::file_reference("file-fe-1"),
                ChatMessage::user("Give me questions"),
            ],
            ResponseFormat::JsonObject,
        )
        .await
        .unwrap();

    assert_eq!(response.id, "chatcmpl-123");
    assert_eq!(response.content.as_deref(), Some("{\"questions\": []}"));
    assert_eq!(response.stop_reason.as_deref(), Some("stop"));
    let usage = response.usage.unwrap();
    assert_eq!((usage.input_tokens, usage.output_tokens), (12, 7));
}

#[tokio::test]
async fn test_text_requests_omit_response_format() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("hello")))
        .mount(&server)
        .await;

    // A base URL already ending in /v1 is not extended again
    let client = OpenAiCompatibleClient::new(
        format!("{}/v1/", server.uri()),
        None,
        "qwen-long",
        "dashscope",
    )
    .unwrap();
    let response = client.send_message("hi").await.unwrap();
    assert_eq!(response.content.as_deref(), Some("hello"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("response_format").is_none());
}

#[tokio::test]
async fn test_upload_file_posts_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/files"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file-fe-42",
            "object": "file",
            "bytes": 11,
            "filename": "guide.txt",
            "purpose": "file-extract"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("guide.txt");
    std::fs::write(&file, "hello world").unwrap();

    let uploaded = client(&server)
        .upload_file(&file, "file-extract")
        .await
        .unwrap();
    assert_eq!(uploaded.id, "file-fe-42");
    assert_eq!(uploaded.bytes, Some(11));

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("multipart/form-data"), "{content_type}");
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"purpose\""));
    assert!(body.contains("file-extract"));
    assert!(body.contains("filename=\"guide.txt\""));
    assert!(body.contains("hello world"));
}

#[tokio::test]
async fn test_upload_missing_file_is_io_error() {
    let server = MockServer::start().await;
    let err = client(&server)
        .upload_file(std::path::Path::new("/nonexistent/d2q.pdf"), "file-extract")
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Io { .. }), "{err}");
}

#[tokio::test]
async fn test_api_errors_carry_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let err = client(&server).send_message("hi").await.unwrap_err();
    match err {
        ProviderError::ApiError { status, message } => {
            assert_eq!(status, 429);
            assert_eq!(message, "rate limited");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unparseable_body_is_invalid_format() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = client(&server).send_message("hi").await.unwrap_err();
    match err {
        ProviderError::InvalidFormat(message) => assert!(message.contains("<html>gateway</html>")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_dump_dir_receives_request_and_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let client = client(&server)
        .with_timeout(Duration::from_secs(5))
        .unwrap()
        .with_dump_dir(dir.path());
    client.send_message("hi").await.unwrap();

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 2, "{names:?}");
    assert!(names[0].ends_with(".request.json"));
    assert!(names[1].ends_with(".response.json"));
}
