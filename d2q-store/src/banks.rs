//! Question bank operations.

use d2q_core::QuestionBank;
use d2q_core::timestamp::{now_iso, now_millis};
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::store::{DataFile, Store};

const DEFAULT_CREATOR: &str = "system";

/// Question bank repository
pub struct QuestionBankRepository;

impl QuestionBankRepository {
    /// Create a bank. Names are unique after trimming; an empty creator
    /// becomes `system`.
    pub async fn create(
        store: &Store,
        bank_name: &str,
        creator: Option<&str>,
    ) -> StoreResult<QuestionBank> {
        let bank_name = bank_name.trim().to_string();
        let creator = creator
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CREATOR)
            .to_string();

        store
            .update(DataFile::QuestionBanks, |banks: &mut Vec<QuestionBank>| {
                if banks.iter().any(|b| b.bank_name == bank_name) {
                    return Err(StoreError::DuplicateName(bank_name));
                }

                // Ids are millisecond based; bump past any taken value.
                let mut millis = now_millis();
                while banks.iter().any(|b| b.bank_id == format!("bank_{millis}")) {
                    millis += 1;
                }

                let bank = QuestionBank {
                    bank_id: format!("bank_{millis}"),
                    bank_name,
                    creator,
                    created_time: now_iso(),
                };
                banks.push(bank.clone());
                info!("Created question bank {} ({})", bank.bank_name, bank.bank_id);
                Ok(bank)
            })
            .await
    }

    /// All banks, newest first.
    pub async fn list(store: &Store) -> StoreResult<Vec<QuestionBank>> {
        let mut banks: Vec<QuestionBank> = store.read(DataFile::QuestionBanks).await?;
        banks.sort_by(|a, b| b.created_time.cmp(&a.created_time));
        Ok(banks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::create_test_store;

    #[tokio::test]
    async fn test_create_and_list() {
        let (_dir, store) = create_test_store().await.unwrap();

        let first = QuestionBankRepository::create(&store, "Biology", None)
            .await
            .unwrap();
        assert!(first.bank_id.starts_with("bank_"));
        assert_eq!(first.creator, "system");

        let second = QuestionBankRepository::create(&store, " Chemistry ", Some("alice"))
            .await
            .unwrap();
        assert_ne!(first.bank_id, second.bank_id);
        assert_eq!(second.bank_name, "Chemistry");

        let banks = QuestionBankRepository::list(&store).await.unwrap();
        assert_eq!(banks.len(), 2);
        assert_eq!(banks[0].bank_name, "Chemistry");
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected() {
        let (_dir, store) = create_test_store().await.unwrap();
        QuestionBankRepository::create(&store, "Physics", None)
            .await
            .unwrap();
        let result = QuestionBankRepository::create(&store, "Physics", None).await;
        assert!(matches!(result, Err(StoreError::DuplicateName(name)) if name == "Physics"));
    }
}
