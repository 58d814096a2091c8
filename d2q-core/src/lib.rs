//! d2q-core: domain types and pure logic for the Doc2Quiz backend.
//!
//! Everything in here is I/O free except configuration loading, so the
//! storage and gateway crates can share one vocabulary.

pub mod bank;
pub mod compose;
pub mod config;
pub mod error;
pub mod json_match;
pub mod knowledge;
pub mod question;
mod serde_util;
pub mod timestamp;
pub mod tree;

// Config re-exports
pub use config::{
    Config, ConfigError, GatewaySettings, LlmProvider, LlmSettings, LoggingSettings, Secrets,
    Settings, SettingsError, StorageSettings, load_dotenv,
};

// Domain re-exports
pub use bank::{QuestionBank, Quiz, QuizQuestion};
pub use compose::{Composition, TypeCounts, TypeSelection, TypeStatistics, compose, type_statistics};
pub use error::{CoreError, CoreResult};
pub use json_match::json_match;
pub use knowledge::{DirectoryEntry, KnowledgeItem, KnowledgeNode, NodeKind, parse_directory};
pub use question::{ExpandedQuestion, QuestionContent, QuestionRecord, QuestionType};
