//! d2q-store: file-backed persistence for the Doc2Quiz backend.
//!
//! This crate provides repositories over:
//! - the knowledge tree
//! - stored questions and question banks
//! - quizzes and the questions placed on them
//! - uploaded documents
//!
//! Each data file is a JSON object wrapping one array. Rewrites of the same
//! file are serialized through [`Store`].

pub mod banks;
pub mod error;
pub mod files;
mod json_file;
pub mod knowledge;
pub mod questions;
pub mod quizzes;
pub mod store;

// Re-export commonly used types
pub use banks::QuestionBankRepository;
pub use error::{StoreError, StoreResult};
pub use files::{FileInfo, FileRepository, StoredFile};
pub use knowledge::{KnowledgePoint, KnowledgeTreeRepository};
pub use questions::{QuestionInfo, QuestionPage, QuestionRepository, SavedBatch};
pub use quizzes::{QuizQuestionRepository, QuizRepository};
pub use store::{DataFile, Page, Store};

// Re-export test helpers when running tests or when test-helpers feature is enabled
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
