//! Knowledge tree node types.
//!
//! The tree is persisted as a flat list of [`KnowledgeItem`]s linked by
//! `parentId`. [`KnowledgeNode`] is the nested form exchanged with clients;
//! see [`crate::tree`] for the conversions between the two.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::serde_util::{lenient_i64, lenient_string, null_as_default};

/// Kind of a knowledge tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    Document,
    Knowledge,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Folder => "folder",
            NodeKind::Document => "document",
            NodeKind::Knowledge => "knowledge",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One node of the flat knowledge tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// `None` marks a root
    #[serde(rename = "parentId", default)]
    pub parent_id: Option<String>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Source document of an extracted knowledge point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Id the model gave this entry in its directory listing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<i64>,
}

impl KnowledgeItem {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: NodeKind,
        parent_id: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            parent_id,
            created_at: None,
            file_name: None,
            node_id: None,
        }
    }

    pub fn is_knowledge(&self) -> bool {
        self.kind == NodeKind::Knowledge
    }
}

/// Nested form of a knowledge node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    #[serde(flatten)]
    pub item: KnowledgeItem,
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<KnowledgeNode>,
}

impl KnowledgeNode {
    pub fn leaf(item: KnowledgeItem) -> Self {
        Self {
            item,
            children: Vec::new(),
        }
    }

    /// Number of nodes in this subtree, including itself.
    pub fn subtree_size(&self) -> usize {
        1 + self.children.iter().map(KnowledgeNode::subtree_size).sum::<usize>()
    }
}

/// An entry of the directory listing a model returns for a document.
///
/// `parent_id == -1` marks a top-level entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    #[serde(deserialize_with = "lenient_i64")]
    pub id: i64,
    #[serde(deserialize_with = "lenient_string")]
    pub text: String,
    #[serde(rename = "parentId", default = "top_level", deserialize_with = "lenient_i64")]
    pub parent_id: i64,
}

fn top_level() -> i64 {
    -1
}

/// Interpret a parsed model reply as a directory listing.
///
/// Accepts a bare array or an object wrapping it under `items` or
/// `directory`. Entries that do not look like directory entries are dropped.
pub fn parse_directory(value: Value) -> Vec<DirectoryEntry> {
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(mut map) => match map.remove("items").or_else(|| map.remove("directory")) {
            Some(Value::Array(entries)) => entries,
            _ => {
                warn!("Directory reply is an object without an items/directory array");
                return Vec::new();
            }
        },
        other => {
            warn!("Directory reply is not an array: {}", other);
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<DirectoryEntry>(entry) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping malformed directory entry: {}", e);
                None
            }
        })
        .collect()
}
