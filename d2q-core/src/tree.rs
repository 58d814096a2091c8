//! Conversions between the flat, parent-linked knowledge list and the
//! nested tree, plus the graph queries the handlers need.
//!
//! Nothing here assumes the input is a well-formed tree: dangling parents
//! become roots and every walk is cycle-safe. [`validate`] is the only place
//! that rejects malformed input.

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::knowledge::{DirectoryEntry, KnowledgeItem, KnowledgeNode, NodeKind};
use crate::timestamp::now_iso;

/// Build the nested forest from a flat list.
///
/// Sibling order follows input order. A node whose parent is unknown is a
/// root. Nodes that only reach each other through a cycle are attached under
/// the first of them in input order, so no node is ever dropped.
pub fn build_tree(items: &[KnowledgeItem]) -> Vec<KnowledgeNode> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        index.entry(item.id.as_str()).or_insert(i);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); items.len()];
    let mut roots = Vec::new();
    for (i, item) in items.iter().enumerate() {
        match item.parent_id.as_deref().and_then(|p| index.get(p)) {
            Some(&parent) if parent != i => children[parent].push(i),
            _ => roots.push(i),
        }
    }

    let mut placed = vec![false; items.len()];
    let mut forest: Vec<KnowledgeNode> = roots
        .into_iter()
        .map(|root| assemble(root, items, &children, &mut placed))
        .collect();

    // Whatever is still unplaced hangs off a parent cycle.
    for i in 0..items.len() {
        if !placed[i] {
            forest.push(assemble(i, items, &children, &mut placed));
        }
    }

    forest
}

fn assemble(
    at: usize,
    items: &[KnowledgeItem],
    children: &[Vec<usize>],
    placed: &mut [bool],
) -> KnowledgeNode {
    placed[at] = true;
    let mut node = KnowledgeNode::leaf(items[at].clone());
    for &child in &children[at] {
        if !placed[child] {
            node.children.push(assemble(child, items, children, placed));
        }
    }
    node
}

/// Flatten a nested forest back into the persisted form.
///
/// Pre-order. A child's `parentId` is rewritten to its enclosing node; a
/// top-level node keeps whatever `parentId` it was given. Missing
/// `createdAt` values are filled with the current time.
pub fn flatten(forest: Vec<KnowledgeNode>) -> Vec<KnowledgeItem> {
    let mut out = Vec::new();
    for node in forest {
        flatten_into(node, None, &mut out);
    }
    out
}

fn flatten_into(node: KnowledgeNode, parent: Option<&str>, out: &mut Vec<KnowledgeItem>) {
    let KnowledgeNode { mut item, children } = node;
    if let Some(parent) = parent {
        item.parent_id = Some(parent.to_string());
    }
    if item.created_at.as_deref().is_none_or(str::is_empty) {
        item.created_at = Some(now_iso());
    }
    let id = item.id.clone();
    out.push(item);
    for child in children {
        flatten_into(child, Some(&id), out);
    }
}

/// Reject duplicate ids and parent cycles.
pub fn validate(items: &[KnowledgeItem]) -> CoreResult<()> {
    let mut parents: HashMap<&str, Option<&str>> = HashMap::with_capacity(items.len());
    for item in items {
        if parents
            .insert(item.id.as_str(), item.parent_id.as_deref())
            .is_some()
        {
            return Err(CoreError::DuplicateId(item.id.clone()));
        }
    }

    // Nodes already known to reach a root.
    let mut grounded: HashSet<&str> = HashSet::new();
    for item in items {
        let mut path: Vec<&str> = Vec::new();
        let mut on_path: HashSet<&str> = HashSet::new();
        let mut cursor = Some(item.id.as_str());

        while let Some(id) = cursor {
            if grounded.contains(id) {
                break;
            }
            if !on_path.insert(id) {
                return Err(CoreError::Cycle(id.to_string()));
            }
            path.push(id);
            cursor = parents.get(id).copied().flatten().filter(|p| parents.contains_key(p));
        }

        grounded.extend(path);
    }

    Ok(())
}

fn children_index(items: &[KnowledgeItem]) -> HashMap<&str, Vec<&str>> {
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for item in items {
        if let Some(parent) = item.parent_id.as_deref() {
            children.entry(parent).or_default().push(item.id.as_str());
        }
    }
    children
}

/// Every transitive descendant of `id`, breadth-first. `id` itself is never
/// included, even when a cycle leads back to it.
pub fn descendants(items: &[KnowledgeItem], id: &str) -> Vec<String> {
    let children = children_index(items);
    let mut seen: HashSet<&str> = HashSet::from([id]);
    let mut queue: VecDeque<&str> = VecDeque::from([id]);
    let mut out = Vec::new();

    while let Some(current) = queue.pop_front() {
        for &child in children.get(current).map(Vec::as_slice).unwrap_or_default() {
            if seen.insert(child) {
                out.push(child.to_string());
                queue.push_back(child);
            }
        }
    }

    out
}

/// The given ids plus all of their ancestors. Ids that do not exist in
/// `items` are ignored.
pub fn ancestor_closure<'a, I>(items: &[KnowledgeItem], ids: I) -> HashSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let by_id: HashMap<&str, &KnowledgeItem> =
        items.iter().map(|item| (item.id.as_str(), item)).collect();
    let mut keep: HashSet<String> = HashSet::new();

    for id in ids {
        let mut cursor = by_id.get(id).copied();
        while let Some(node) = cursor {
            if !keep.insert(node.id.clone()) {
                break;
            }
            cursor = node.parent_id.as_deref().and_then(|p| by_id.get(p).copied());
        }
    }

    keep
}

/// Convert a model's directory listing into knowledge nodes under a document.
///
/// Every entry gets a fresh uuid. Top-level entries and entries whose parent
/// is not part of the listing hang directly off `document_id`.
pub fn directory_to_items(
    entries: &[DirectoryEntry],
    document_id: &str,
    file_name: &str,
) -> Vec<KnowledgeItem> {
    let mut ids: HashMap<i64, String> = HashMap::with_capacity(entries.len());
    let unique: Vec<&DirectoryEntry> = entries
        .iter()
        .filter(|entry| {
            if ids.contains_key(&entry.id) {
                return false;
            }
            ids.insert(entry.id, Uuid::new_v4().to_string());
            true
        })
        .collect();
    let created_at = now_iso();

    unique
        .into_iter()
        .map(|entry| {
            let parent = if entry.parent_id == -1 || entry.parent_id == entry.id {
                None
            } else {
                ids.get(&entry.parent_id)
            };
            KnowledgeItem {
                id: ids[&entry.id].clone(),
                name: entry.text.clone(),
                kind: NodeKind::Knowledge,
                parent_id: Some(parent.cloned().unwrap_or_else(|| document_id.to_string())),
                created_at: Some(created_at.clone()),
                file_name: Some(file_name.to_string()),
                node_id: Some(entry.id),
            }
        })
        .collect()
}
