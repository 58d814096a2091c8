//! Knowledge tree persistence.

use std::collections::HashSet;

use d2q_core::tree::{ancestor_closure, descendants, validate};
use d2q_core::{KnowledgeItem, QuestionRecord};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::StoreResult;
use crate::store::{DataFile, Store};

/// Flat view of an extracted knowledge point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePoint {
    pub file_name: String,
    /// Parent node of the point
    pub knowledge_item_id: String,
    pub node_id: Option<i64>,
    pub text: String,
    pub id: String,
}

/// Knowledge tree repository
pub struct KnowledgeTreeRepository;

impl KnowledgeTreeRepository {
    pub async fn load(store: &Store) -> StoreResult<Vec<KnowledgeItem>> {
        store.read(DataFile::KnowledgeTree).await
    }

    /// Replace the whole tree. Duplicate ids and parent cycles are rejected
    /// before anything is written.
    pub async fn save(store: &Store, items: Vec<KnowledgeItem>) -> StoreResult<usize> {
        validate(&items)?;

        let _guard = store.lock(DataFile::KnowledgeTree).await;
        store.write(DataFile::KnowledgeTree, &items).await?;
        info!("Knowledge tree saved with {} nodes", items.len());
        Ok(items.len())
    }

    /// Merge freshly extracted points under `document_id`.
    ///
    /// Knowledge nodes below the document that came from the same file are
    /// replaced, together with anything hanging off them. Returns the number
    /// of nodes added; 0 when the document does not exist.
    pub async fn merge_extracted(
        store: &Store,
        document_id: &str,
        file_name: &str,
        new_items: Vec<KnowledgeItem>,
    ) -> StoreResult<usize> {
        store
            .update(DataFile::KnowledgeTree, |items: &mut Vec<KnowledgeItem>| {
                if !items.iter().any(|item| item.id == document_id) {
                    warn!("Parent document {} not found; nothing merged", document_id);
                    return Ok(0);
                }

                let stale: Vec<String> = descendants(items, document_id)
                    .into_iter()
                    .filter(|id| {
                        items.iter().any(|item| {
                            &item.id == id
                                && item.is_knowledge()
                                && item.file_name.as_deref() == Some(file_name)
                        })
                    })
                    .collect();
                let mut removed: HashSet<String> = HashSet::new();
                for id in stale {
                    removed.extend(descendants(items, &id));
                    removed.insert(id);
                }
                items.retain(|item| !removed.contains(&item.id));

                let added = new_items.len();
                items.extend(new_items);
                validate(items)?;

                info!(
                    "Merged {} knowledge points from {} under {} (replaced {})",
                    added,
                    file_name,
                    document_id,
                    removed.len()
                );
                Ok(added)
            })
            .await
    }

    /// All knowledge points, or only the direct children of `parent_id`.
    pub async fn list_points(
        store: &Store,
        parent_id: Option<&str>,
    ) -> StoreResult<Vec<KnowledgePoint>> {
        let items = Self::load(store).await?;
        Ok(items
            .into_iter()
            .filter(|item| item.is_knowledge())
            .filter(|item| parent_id.is_none() || item.parent_id.as_deref() == parent_id)
            .map(|item| KnowledgePoint {
                file_name: item.file_name.unwrap_or_default(),
                knowledge_item_id: item.parent_id.unwrap_or_default(),
                node_id: item.node_id,
                text: item.name,
                id: item.id,
            })
            .collect())
    }

    /// Delete every descendant of `id` (the node itself stays). Returns the
    /// number of nodes removed.
    pub async fn delete_descendants(store: &Store, id: &str) -> StoreResult<usize> {
        store
            .update(DataFile::KnowledgeTree, |items: &mut Vec<KnowledgeItem>| {
                let doomed: HashSet<String> = descendants(items, id).into_iter().collect();
                items.retain(|item| !doomed.contains(&item.id));
                info!("Deleted {} knowledge nodes below {}", doomed.len(), id);
                Ok(doomed.len())
            })
            .await
    }

    /// Nodes that have questions attached (optionally only questions of
    /// `bank_id`) plus all of their ancestors, in stored order.
    pub async fn filtered_for_compose(
        store: &Store,
        bank_id: Option<&str>,
    ) -> StoreResult<Vec<KnowledgeItem>> {
        let questions: Vec<QuestionRecord> = store.read(DataFile::Questions).await?;
        let with_questions: HashSet<&str> = questions
            .iter()
            .filter(|q| bank_id.is_none() || q.bank_id.as_deref() == bank_id)
            .filter_map(|q| q.knowledge_id.as_deref())
            .filter(|id| !id.is_empty())
            .collect();
        if with_questions.is_empty() {
            return Ok(Vec::new());
        }

        let items = Self::load(store).await?;
        let keep = ancestor_closure(&items, with_questions.iter().copied());
        let total = items.len();
        let filtered: Vec<KnowledgeItem> = items
            .into_iter()
            .filter(|item| keep.contains(&item.id))
            .collect();

        info!(
            "Compose tree has {} of {} nodes{}",
            filtered.len(),
            total,
            bank_id.map(|b| format!(" for bank {b}")).unwrap_or_default()
        );
        Ok(filtered)
    }
}
