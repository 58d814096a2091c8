//! Live calls against the configured LLM backend.
//!
//! Run with: cargo test --features live-tests
//!
//! Needs the API key named by `[llm].api_key_env` (DASHSCOPE_API_KEY by
//! default). Snapshots redact ids and token counts.

#[cfg(feature = "live-tests")]
use d2q_gateway::providers::{ChatMessage, Provider, ResponseFormat, build_provider};
#[cfg(feature = "live-tests")]
use insta::assert_json_snapshot;

#[cfg(feature = "live-tests")]
fn live_provider() -> std::sync::Arc<dyn Provider> {
    d2q_core::load_dotenv();
    let config = d2q_core::Config::load().expect("Failed to load config for live tests");
    let api_key = config
        .llm_api_key()
        .expect("LLM API key must be set for live tests");
    build_provider(&config.settings.llm, &config.settings.logging, api_key)
        .expect("build provider")
}

#[cfg(feature = "live-tests")]
#[tokio::test]
async fn test_simple_json_reply() {
    let provider = live_provider();
    let response = provider
        .send_conversation(
            vec![ChatMessage::user(
                r#"Reply with exactly this JSON and nothing else: {"ok": true}"#,
            )],
            ResponseFormat::JsonObject,
        )
        .await
        .expect("API call failed");

    let text = d2q_gateway::extract_text(&response).expect("reply text");
    assert_eq!(d2q_core::json_match(&text), Some(serde_json::json!({"ok": true})));
    assert_json_snapshot!(
        "simple_json_reply",
        response,
        {
            ".id" => "[id]",
            ".model" => "[model]",
            ".usage" => "[usage]"
        }
    );
}

#[cfg(feature = "live-tests")]
#[tokio::test]
async fn test_directory_of_uploaded_document() {
    let provider = live_provider();
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("manual.txt");
    std::fs::write(
        &path,
        "第一章 安装\n1.1 环境要求\n1.2 安装步骤\n第二章 使用\n2.1 基本命令\n",
    )
    .unwrap();

    let uploaded = provider
        .upload_file(&path, "file-extract")
        .await
        .expect("upload failed");
    assert!(!uploaded.id.is_empty());

    let response = provider
        .send_conversation(
            vec![
                ChatMessage::file_reference(&uploaded.id),
                ChatMessage::user("根据文档整理目录，返回json数组，每项包含 id、text、parentId，根节点 parentId=-1"),
            ],
            ResponseFormat::Text,
        )
        .await
        .expect("API call failed");

    let text = d2q_gateway::extract_text(&response).expect("reply text");
    let directory = d2q_core::parse_directory(d2q_core::json_match(&text).expect("JSON reply"));
    assert!(directory.len() >= 2, "{text}");
}
