//! Stored question operations.

use d2q_core::timestamp::now_iso;
use d2q_core::{ExpandedQuestion, QuestionContent, QuestionRecord};
use serde::Serialize;
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::store::{DataFile, Page, Store};

/// Result of saving one batch of questions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedBatch {
    /// First id of the batch, if any question was saved
    pub question_id: Option<String>,
    pub created_time: String,
    pub question_ids: Vec<String>,
}

/// Id and time of the newest question in a listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionInfo {
    pub question_id: String,
    pub created_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionPage {
    #[serde(flatten)]
    pub page: Page<ExpandedQuestion>,
    pub question_info: Option<QuestionInfo>,
}

fn newest_first(records: &mut [QuestionRecord]) {
    records.sort_by(|a, b| b.created_time.cmp(&a.created_time));
}

/// Question repository for the question file
pub struct QuestionRepository;

impl QuestionRepository {
    pub async fn load(store: &Store) -> StoreResult<Vec<QuestionRecord>> {
        store.read(DataFile::Questions).await
    }

    /// Store a batch. All records share one `created_time`, which is what
    /// [`QuestionRepository::assign_bank_to_batch`] keys on.
    pub async fn save_batch(
        store: &Store,
        contents: Vec<QuestionContent>,
        bank_id: Option<String>,
    ) -> StoreResult<SavedBatch> {
        let created_time = now_iso();
        let records: Vec<QuestionRecord> = contents
            .into_iter()
            .map(|content| QuestionRecord::new(content, bank_id.clone(), created_time.clone()))
            .collect();
        let question_ids: Vec<String> = records.iter().map(|r| r.question_id.clone()).collect();

        store
            .update(DataFile::Questions, |stored: &mut Vec<QuestionRecord>| {
                stored.extend(records);
                Ok(())
            })
            .await?;

        info!(
            "Saved {} questions{}",
            question_ids.len(),
            bank_id.map(|b| format!(" into bank {b}")).unwrap_or_default()
        );
        Ok(SavedBatch {
            question_id: question_ids.first().cloned(),
            created_time,
            question_ids,
        })
    }

    /// Replace the content of a stored question.
    ///
    /// The record keeps its knowledge point when the new content does not
    /// name one.
    pub async fn update_content(
        store: &Store,
        question_id: &str,
        mut content: QuestionContent,
    ) -> StoreResult<QuestionRecord> {
        store
            .update(DataFile::Questions, |stored: &mut Vec<QuestionRecord>| {
                let record = stored
                    .iter_mut()
                    .find(|r| r.question_id == question_id)
                    .ok_or_else(|| StoreError::NotFound(format!("Question {question_id}")))?;

                if content.knowledge_id.is_none() {
                    content.knowledge_id = record.knowledge_id.clone();
                }
                record.knowledge_id = content.knowledge_id.clone();
                record.question_content = content;
                info!("Updated question {}", question_id);
                Ok(record.clone())
            })
            .await
    }

    /// Put every not-yet-banked question of `question_id`'s batch into
    /// `bank_id`. Returns how many records changed.
    pub async fn assign_bank_to_batch(
        store: &Store,
        question_id: &str,
        bank_id: &str,
    ) -> StoreResult<usize> {
        store
            .update(DataFile::Questions, |stored: &mut Vec<QuestionRecord>| {
                let created_time = stored
                    .iter()
                    .find(|r| r.question_id == question_id)
                    .map(|r| r.created_time.clone())
                    .ok_or_else(|| StoreError::NotFound(format!("Question {question_id}")))?;

                let mut updated = 0;
                for record in stored.iter_mut() {
                    if record.created_time == created_time && record.bank_id.is_none() {
                        record.bank_id = Some(bank_id.to_string());
                        updated += 1;
                    }
                }
                info!(
                    "Batch {} assigned to bank {} ({} questions)",
                    created_time, bank_id, updated
                );
                Ok(updated)
            })
            .await
    }

    /// Newest first, optionally restricted to one bank.
    pub async fn list(
        store: &Store,
        page: usize,
        page_size: usize,
        bank_id: Option<&str>,
    ) -> StoreResult<QuestionPage> {
        let mut records: Vec<QuestionRecord> = Self::load(store)
            .await?
            .into_iter()
            .filter(|r| bank_id.is_none() || r.bank_id.as_deref() == bank_id)
            .collect();
        newest_first(&mut records);

        let question_info = records.first().map(|r| QuestionInfo {
            question_id: r.question_id.clone(),
            created_time: r.created_time.clone(),
        });
        let expanded = records.iter().map(QuestionRecord::expand).collect();

        Ok(QuestionPage {
            page: Page::of(expanded, page, page_size),
            question_info,
        })
    }

    /// Every stored question, newest first.
    pub async fn history(store: &Store) -> StoreResult<Vec<ExpandedQuestion>> {
        let mut records = Self::load(store).await?;
        newest_first(&mut records);
        Ok(records.iter().map(QuestionRecord::expand).collect())
    }

    pub async fn delete(store: &Store, question_id: &str) -> StoreResult<()> {
        store
            .update(DataFile::Questions, |stored: &mut Vec<QuestionRecord>| {
                let before = stored.len();
                stored.retain(|r| r.question_id != question_id);
                if stored.len() == before {
                    return Err(StoreError::NotFound(format!("Question {question_id}")));
                }
                info!("Deleted question {}", question_id);
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_store;

    fn content(question: &str, knowledge: &str) -> QuestionContent {
        QuestionContent {
            question: question.to_string(),
            knowledge_id: Some(knowledge.to_string()),
            ..QuestionContent::default()
        }
    }

    #[tokio::test]
    async fn test_save_batch_shares_created_time() {
        let (_dir, store) = create_test_store().await.unwrap();
        let batch = QuestionRepository::save_batch(
            &store,
            vec![content("one", "k1"), content("two", "k2")],
            None,
        )
        .await
        .unwrap();

        assert_eq!(batch.question_ids.len(), 2);
        assert_eq!(batch.question_id.as_deref(), Some(batch.question_ids[0].as_str()));

        let stored = QuestionRepository::load(&store).await.unwrap();
        assert!(stored.iter().all(|r| r.created_time == batch.created_time));
        assert_eq!(stored[1].knowledge_id.as_deref(), Some("k2"));
    }

    #[tokio::test]
    async fn test_assign_bank_only_touches_unbanked_batch_members() {
        let (_dir, store) = create_test_store().await.unwrap();
        let first = QuestionRepository::save_batch(
            &store,
            vec![content("a", "k"), content("b", "k")],
            None,
        )
        .await
        .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        QuestionRepository::save_batch(&store, vec![content("c", "k")], None)
            .await
            .unwrap();

        let updated =
            QuestionRepository::assign_bank_to_batch(&store, &first.question_ids[1], "bank_1")
                .await
                .unwrap();
        assert_eq!(updated, 2);

        let again =
            QuestionRepository::assign_bank_to_batch(&store, &first.question_ids[0], "bank_2")
                .await
                .unwrap();
        assert_eq!(again, 0);

        let page = QuestionRepository::list(&store, 1, 10, Some("bank_1"))
            .await
            .unwrap();
        assert_eq!(page.page.total, 2);

        let missing = QuestionRepository::assign_bank_to_batch(&store, "nope", "bank_1").await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_paginated() {
        let (_dir, store) = create_test_store().await.unwrap();
        QuestionRepository::save_batch(&store, vec![content("old", "k")], None)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let newest = QuestionRepository::save_batch(&store, vec![content("new", "k")], None)
            .await
            .unwrap();

        let page = QuestionRepository::list(&store, 1, 1, None).await.unwrap();
        assert_eq!(page.page.total, 2);
        assert_eq!(page.page.data.len(), 1);
        assert_eq!(page.page.data[0].question, "new");
        assert_eq!(
            page.question_info.as_ref().map(|i| i.question_id.as_str()),
            newest.question_id.as_deref()
        );

        let second = QuestionRepository::list(&store, 2, 1, None).await.unwrap();
        assert_eq!(second.page.data[0].question, "old");

        let history = QuestionRepository::history(&store).await.unwrap();
        assert_eq!(history[0].question, "new");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (_dir, store) = create_test_store().await.unwrap();
        let batch = QuestionRepository::save_batch(&store, vec![content("q", "k1")], None)
            .await
            .unwrap();
        let id = batch.question_id.unwrap();

        let edited = QuestionContent {
            question: "edited".to_string(),
            answer: "B".to_string(),
            ..QuestionContent::default()
        };
        let record = QuestionRepository::update_content(&store, &id, edited)
            .await
            .unwrap();
        assert_eq!(record.question_content.question, "edited");
        assert_eq!(record.knowledge_id.as_deref(), Some("k1"));

        QuestionRepository::delete(&store, &id).await.unwrap();
        assert!(matches!(
            QuestionRepository::delete(&store, &id).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            QuestionRepository::update_content(&store, &id, QuestionContent::default()).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
