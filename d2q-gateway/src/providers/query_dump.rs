//! Debug query logging for LLM provider requests and responses.
//!
//! When enabled via `dump_queries = true` in `[logging]` config, writes raw
//! JSON to `./logs/queries/{timestamp}-{provider}-{model}.{phase}.json`.
//! Request and response share the same base name so they sort together.
//! Failures are logged as warnings but never block the request.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;
use tracing::warn;

pub const DEFAULT_QUERY_DIR: &str = "./logs/queries";

/// Handle for a query dump session, pairing request and response files.
pub struct QueryDump {
    dir: PathBuf,
    stem: String,
}

impl QueryDump {
    /// Dump the request JSON into `dir` and return a handle for the paired
    /// response.
    pub async fn request(dir: &Path, provider: &str, model: &str, value: &Value) -> Option<Self> {
        let stem = format!(
            "{}-{}-{}",
            Utc::now().format("%Y%m%d-%H%M%S-%3f"),
            sanitize(provider),
            sanitize(model)
        );

        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("dump_queries: failed to create dir: {}", e);
            return None;
        }

        let dump = Self {
            dir: dir.to_path_buf(),
            stem,
        };
        write_json(&dump.path("request"), value).await;
        Some(dump)
    }

    /// Dump the response JSON paired with the earlier request.
    pub async fn response(&self, value: &Value) {
        write_json(&self.path("response"), value).await;
    }

    fn path(&self, phase: &str) -> PathBuf {
        self.dir.join(format!("{}.{}.json", self.stem, phase))
    }
}

/// Make a name safe for use in filenames.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

async fn write_json(path: &Path, value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(json_str) => {
            if let Err(e) = tokio::fs::write(path, json_str).await {
                warn!("dump_queries: failed to write {}: {}", path.display(), e);
            }
        }
        Err(e) => {
            warn!("dump_queries: failed to serialize: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("qwen-long"), "qwen-long");
        assert_eq!(sanitize("gpt-4.1/mini"), "gpt-4_1_mini");
    }

    #[tokio::test]
    async fn test_request_and_response_share_base_name() {
        let dir = tempfile::tempdir().unwrap();
        let queries = dir.path().join("queries");

        let dump = QueryDump::request(&queries, "dashscope", "qwen-long", &json!({"a": 1}))
            .await
            .unwrap();
        dump.response(&json!({"b": 2})).await;

        let mut names: Vec<String> = std::fs::read_dir(&queries)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with("-dashscope-qwen-long.request.json"));
        assert_eq!(
            names[0].trim_end_matches(".request.json"),
            names[1].trim_end_matches(".response.json")
        );
    }
}
