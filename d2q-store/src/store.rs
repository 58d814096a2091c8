//! Store handle: where the data files live and who may rewrite them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use d2q_core::StorageSettings;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::error::StoreResult;
use crate::json_file::{load_items, save_items};

/// The five data files and the key their array is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFile {
    KnowledgeTree,
    Questions,
    QuestionBanks,
    Quizzes,
    QuizQuestions,
}

impl DataFile {
    pub fn file_name(&self) -> &'static str {
        match self {
            DataFile::KnowledgeTree => "knowledge_tree.json",
            DataFile::Questions => "question.json",
            DataFile::QuestionBanks => "question_bank.json",
            DataFile::Quizzes => "quiz_bank.json",
            DataFile::QuizQuestions => "quiz_question.json",
        }
    }

    pub fn wrapper_key(&self) -> &'static str {
        match self {
            DataFile::KnowledgeTree => "items",
            DataFile::Questions => "questions",
            DataFile::QuestionBanks => "banks",
            DataFile::Quizzes => "quizs",
            DataFile::QuizQuestions => "quiz_questions",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// File-backed store wrapper.
///
/// Cheap to clone. Every read-modify-write cycle on a data file holds that
/// file's lock, so concurrent requests cannot lose each other's updates.
/// Plain reads skip the lock since writes are atomic renames.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    data_dir: PathBuf,
    file_dir: PathBuf,
    locks: Arc<[Mutex<()>; 5]>,
}

impl Store {
    /// Open a store, creating its directories.
    ///
    /// `data_dir` and `file_dir` are resolved against `root` unless absolute.
    pub async fn open(
        root: impl Into<PathBuf>,
        data_dir: impl AsRef<Path>,
        file_dir: impl AsRef<Path>,
    ) -> StoreResult<Self> {
        let root = root.into();
        let data_dir = root.join(data_dir);
        let file_dir = root.join(file_dir);

        tokio::fs::create_dir_all(&data_dir).await?;
        tokio::fs::create_dir_all(&file_dir).await?;
        info!(
            "Opened store: data at {}, uploads at {}",
            data_dir.display(),
            file_dir.display()
        );

        Ok(Self {
            root,
            data_dir,
            file_dir,
            locks: Arc::new(std::array::from_fn(|_| Mutex::new(()))),
        })
    }

    pub async fn from_settings(settings: &StorageSettings) -> StoreResult<Self> {
        Self::open(&settings.root, &settings.data_dir, &settings.file_dir).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding uploaded documents
    pub fn file_dir(&self) -> &Path {
        &self.file_dir
    }

    pub fn path(&self, file: DataFile) -> PathBuf {
        self.data_dir.join(file.file_name())
    }

    pub(crate) async fn lock(&self, file: DataFile) -> MutexGuard<'_, ()> {
        self.locks[file.index()].lock().await
    }

    pub(crate) async fn read<T: DeserializeOwned>(&self, file: DataFile) -> StoreResult<Vec<T>> {
        load_items(&self.path(file), file.wrapper_key()).await
    }

    /// Caller must hold the file's lock.
    pub(crate) async fn write<T: Serialize>(&self, file: DataFile, items: &[T]) -> StoreResult<()> {
        save_items(&self.path(file), file.wrapper_key(), items).await
    }

    /// Run `f` over the file's records under its lock and persist the result.
    ///
    /// Nothing is written when `f` fails.
    pub(crate) async fn update<T, R, F>(&self, file: DataFile, f: F) -> StoreResult<R>
    where
        T: DeserializeOwned + Serialize,
        F: FnOnce(&mut Vec<T>) -> StoreResult<R>,
    {
        let _guard = self.lock(file).await;
        let mut items = self.read(file).await?;
        let result = f(&mut items)?;
        self.write(file, &items).await?;
        Ok(result)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

impl<T> Page<T> {
    /// Slice `items` to the 1-based `page`. Out-of-range pages are empty.
    pub fn of(items: Vec<T>, page: usize, page_size: usize) -> Self {
        let total = items.len();
        let start = page.saturating_sub(1).saturating_mul(page_size);
        let data = items.into_iter().skip(start).take(page_size).collect();
        Self {
            data,
            total,
            page,
            page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_directories() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path(), "data", "file").await.unwrap();
        assert!(store.data_dir().is_dir());
        assert!(store.file_dir().is_dir());
        assert_eq!(
            store.path(DataFile::Quizzes),
            dir.path().join("data").join("quiz_bank.json")
        );
    }

    #[tokio::test]
    async fn test_update_skips_write_on_error() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path(), "data", "file").await.unwrap();

        store
            .update(DataFile::QuestionBanks, |items: &mut Vec<Value>| {
                items.push(json!({"bank_id": "b1"}));
                Ok(())
            })
            .await
            .unwrap();

        let failed: StoreResult<()> = store
            .update(DataFile::QuestionBanks, |items: &mut Vec<Value>| {
                items.clear();
                Err(crate::StoreError::NotFound("bank".into()))
            })
            .await;
        assert!(failed.is_err());

        let items: Vec<Value> = store.read(DataFile::QuestionBanks).await.unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path(), "data", "file").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(DataFile::Questions, move |items: &mut Vec<Value>| {
                        items.push(json!({ "n": i }));
                        Ok(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let items: Vec<Value> = store.read(DataFile::Questions).await.unwrap();
        assert_eq!(items.len(), 20);
    }

    #[test]
    fn test_page_of() {
        let page = Page::of((1..=25).collect::<Vec<_>>(), 3, 10);
        assert_eq!(page.data, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.total, 25);

        let beyond = Page::of(vec![1, 2, 3], 5, 10);
        assert!(beyond.data.is_empty());
        assert_eq!(beyond.total, 3);
    }
}
