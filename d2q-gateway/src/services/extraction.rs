//! Knowledge point extraction: ask the model for a document's table of
//! contents and graft it onto the knowledge tree.

use d2q_core::{DirectoryEntry, json_match, parse_directory, tree::directory_to_items};
use d2q_store::{FileRepository, KnowledgeTreeRepository, Store};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ApiResult;
use crate::providers::{ChatMessage, Provider, ProviderError, ResponseFormat, extract_text};

/// Purpose tag for documents handed to the model for reading
pub const FILE_EXTRACT_PURPOSE: &str = "file-extract";

const DIRECTORY_PROMPT: &str = r#"根据文档整理目录，返回json数据，例如： [ { "id":1, "text":"目录1", "parentId":-1 }, { "id":2, "text":"目录1.1", "parentId":1 }, { "id":3, "text":"目录2", "parentId":-1 } ] 表示目录1和目录2是同一层级，目录1.1在目录1层级下，通过parentId表示父节点，parentId=-1表示根节点"#;

/// What one extraction produced
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionOutcome {
    /// Directory as the model listed it
    pub directory: Vec<DirectoryEntry>,
    /// Knowledge nodes added to the tree
    pub added_count: usize,
}

/// Ask the model for the directory of one stored document.
pub async fn extract_directory(
    store: &Store,
    provider: &dyn Provider,
    file_path: &str,
) -> ApiResult<Vec<DirectoryEntry>> {
    let path = FileRepository::resolve(store, file_path).await?;
    let uploaded = provider.upload_file(&path, FILE_EXTRACT_PURPOSE).await?;

    let response = provider
        .send_conversation(
            vec![
                ChatMessage::file_reference(&uploaded.id),
                ChatMessage::user(DIRECTORY_PROMPT),
            ],
            ResponseFormat::Text,
        )
        .await?;
    let text = extract_text(&response).ok_or(ProviderError::NoContent)?;
    let value = json_match(&text).ok_or_else(|| {
        ProviderError::InvalidFormat("directory reply holds no JSON".to_string())
    })?;

    let directory = parse_directory(value);
    info!(
        "Model listed {} directory entries for {}",
        directory.len(),
        file_path
    );
    Ok(directory)
}

/// Extract the directory of `file_path` and merge it under the document
/// `knowledge_item_id`. Without a document the directory is only returned.
pub async fn extract_and_merge(
    store: &Store,
    provider: &dyn Provider,
    file_path: &str,
    file_name: &str,
    knowledge_item_id: Option<&str>,
) -> ApiResult<ExtractionOutcome> {
    let directory = extract_directory(store, provider, file_path).await?;

    let added_count = match knowledge_item_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(document_id) if !directory.is_empty() => {
            let items = directory_to_items(&directory, document_id, file_name);
            KnowledgeTreeRepository::merge_extracted(store, document_id, file_name, items).await?
        }
        Some(_) => {
            warn!("Empty directory for {}; knowledge tree left as is", file_name);
            0
        }
        None => 0,
    };

    Ok(ExtractionOutcome {
        directory,
        added_count,
    })
}
