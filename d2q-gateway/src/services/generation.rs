//! Question generation against selected knowledge points.
//!
//! Selected items that share a question-type configuration are generated in
//! one model call together with every source document they reference.

use std::collections::HashSet;
use std::path::PathBuf;

use d2q_core::{KnowledgeItem, QuestionContent, QuestionType, json_match};
use d2q_store::{FileRepository, KnowledgeTreeRepository, Store};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::providers::{ChatMessage, Provider, ProviderError, ResponseFormat, extract_text};
use crate::services::extraction::FILE_EXTRACT_PURPOSE;

/// Largest count accepted for one type at one difficulty
pub const MAX_QUESTIONS_PER_DIFFICULTY: i64 = 100;

/// How many questions of one type to generate per difficulty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionTypeRequest {
    #[serde(rename = "type", default = "default_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub low: i64,
    #[serde(default)]
    pub medium: i64,
    #[serde(default)]
    pub high: i64,
}

fn default_type() -> String {
    QuestionType::SingleChoice.as_str().to_string()
}

impl QuestionTypeRequest {
    fn wants_questions(&self) -> bool {
        self.low > 0 || self.medium > 0 || self.high > 0
    }

    fn exceeds_limit(&self) -> bool {
        [self.low, self.medium, self.high]
            .iter()
            .any(|count| *count > MAX_QUESTIONS_PER_DIFFICULTY)
    }

    fn label(&self) -> String {
        self.label
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                QuestionType::parse(&self.kind)
                    .unwrap_or(QuestionType::SingleChoice)
                    .label()
                    .to_string()
            })
    }
}

/// A tree node picked in the generation UI
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SelectedItem {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Display name of folders and documents
    #[serde(default)]
    pub name: String,
    /// Text of a knowledge point
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub question_types: Vec<QuestionTypeRequest>,
}

impl SelectedItem {
    fn is_knowledge(&self) -> bool {
        self.kind == "knowledge"
    }

    fn has_quantity(&self) -> bool {
        self.question_types.iter().any(QuestionTypeRequest::wants_questions)
    }
}

/// One line of the requirement list sent to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub label: String,
    pub difficulty: &'static str,
}

/// A knowledge point as cited in the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPoint {
    pub id: String,
    pub text: String,
}

/// Key under which items with the same configuration are grouped.
fn config_key(question_types: &[QuestionTypeRequest]) -> String {
    let mut sorted = question_types.to_vec();
    sorted.sort_by(|a, b| {
        (&a.kind, a.low, a.medium, a.high).cmp(&(&b.kind, b.low, b.medium, b.high))
    });
    serde_json::to_string(&sorted).unwrap_or_default()
}

/// Items that request at least one question, grouped by configuration in
/// first-seen order.
pub fn group_by_config(items: &[SelectedItem]) -> Vec<Vec<&SelectedItem>> {
    let mut groups: Vec<(String, Vec<&SelectedItem>)> = Vec::new();
    for item in items.iter().filter(|item| item.has_quantity()) {
        let key = config_key(&item.question_types);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(item),
            None => groups.push((key, vec![item])),
        }
    }
    groups.into_iter().map(|(_, members)| members).collect()
}

/// Reject a selection in which no item asks for any question, or one that
/// asks for too many of a type at one difficulty.
pub fn ensure_requested(selected_items: &[SelectedItem]) -> ApiResult<()> {
    if let Some(qt) = selected_items
        .iter()
        .flat_map(|item| &item.question_types)
        .find(|qt| qt.exceeds_limit())
    {
        return Err(ApiError::BadRequest(format!(
            "At most {MAX_QUESTIONS_PER_DIFFICULTY} {} questions per difficulty can be generated",
            qt.kind
        )));
    }
    if selected_items.iter().any(SelectedItem::has_quantity) {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "No question counts configured; set at least one for a knowledge point".to_string(),
        ))
    }
}

/// One requirement per requested question, types in order, difficulties
/// low to high.
pub fn build_requirements(question_types: &[QuestionTypeRequest]) -> Vec<Requirement> {
    let mut requirements = Vec::new();
    for qt in question_types {
        let label = qt.label();
        for (count, difficulty) in [(qt.low, "低"), (qt.medium, "中"), (qt.high, "高")] {
            for _ in 0..count.clamp(0, MAX_QUESTIONS_PER_DIFFICULTY) {
                requirements.push(Requirement {
                    label: label.clone(),
                    difficulty,
                });
            }
        }
    }
    requirements
}

pub fn build_knowledge_text(points: &[PromptPoint]) -> String {
    let lines: Vec<String> = points
        .iter()
        .filter(|p| !p.text.is_empty())
        .map(|p| format!("- [{}] {}", p.id, p.text))
        .collect();
    if lines.is_empty() {
        "根据文档内容".to_string()
    } else {
        lines.join("\n")
    }
}

pub fn build_prompt(knowledge_text: &str, requirements: &[Requirement]) -> String {
    let example = json!({
        "questions": [{
            "type": "single_choice",
            "question": "题目内容",
            "options": ["选项A", "选项B", "选项C", "选项D"],
            "answer": "A",
            "difficulty": "低",
            "score": "1",
            "explanation": "题目解析",
            "knowledge": "知识点1",
            "knowledge_id": "知识点ID"
        }]
    });
    let example = serde_json::to_string_pretty(&example).unwrap_or_default();
    let requirements_text = requirements
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}，难度：{}", i + 1, r.label, r.difficulty))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"根据以下知识点和关联文档，生成 {total} 道题目。

知识点（格式：[ID] 知识点内容）：
{knowledge_text}

题目要求：
{requirements_text}

请严格按照以下 JSON 格式返回题目列表，确保：
1. 返回一个 JSON 对象，包含 "questions" 数组
2. 每道题目包含以下字段：
   - type: 题型（single_choice/multiple_choice/true_false/essay）
   - question: 题干（字符串）
   - options: 选项数组（单选题/多选题必填，判断题和问答题可为空数组）
   - answer: 答案（单选题/判断题为单个选项如"A"或"正确"，多选题为多个选项如"AB"，问答题为参考答案文本）
   - difficulty: 难易度（"低"/"中"/"高"）
   - score: 分值（字符串，如"1"、"2"、"5"）
   - explanation: 试题解析（字符串）
   - knowledge: 知识点内容
   - knowledge_id: 知识点ID（从上述知识点列表中提取对应的ID，如果题目涉及多个知识点，使用第一个知识点的ID）
3. 题目顺序必须与上述要求顺序一致
4. 只返回 JSON，不要包含任何其他文字说明

JSON 格式示例：
{example}"#,
        total = requirements.len(),
    )
}

/// Read the questions out of a model reply. Entries that are not question
/// objects are dropped.
pub fn parse_questions(value: Value) -> Vec<QuestionContent> {
    let entries = match value {
        Value::Object(mut map) => match map.remove("questions") {
            Some(Value::Array(entries)) => entries,
            _ => Vec::new(),
        },
        Value::Array(entries) => entries,
        _ => Vec::new(),
    };
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(question) => Some(question),
            Err(e) => {
                warn!("Skipping malformed generated question: {}", e);
                None
            }
        })
        .collect()
}

async fn resolve_source(store: &Store, file_name: &str, paths: &mut Vec<PathBuf>) {
    match FileRepository::resolve(store, file_name).await {
        Ok(path) => {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        Err(e) => warn!("Source document {} unavailable: {}", file_name, e),
    }
}

/// Source documents and prompt points for one group.
async fn collect_sources(
    store: &Store,
    tree: &[KnowledgeItem],
    group: &[&SelectedItem],
) -> (Vec<PathBuf>, Vec<PromptPoint>) {
    let mut paths = Vec::new();
    let mut points = Vec::new();
    let mut seen_files: HashSet<String> = HashSet::new();

    for item in group {
        if item.is_knowledge() {
            let text = if item.text.is_empty() {
                tree.iter()
                    .find(|node| node.id == item.id)
                    .map(|node| node.name.clone())
                    .unwrap_or_default()
            } else {
                item.text.clone()
            };
            if !text.is_empty() {
                points.push(PromptPoint {
                    id: item.id.clone(),
                    text,
                });
            }
            if let Some(file_name) = item.file_name.as_deref().filter(|f| !f.is_empty()) {
                if seen_files.insert(file_name.to_string()) {
                    resolve_source(store, file_name, &mut paths).await;
                }
            }
        } else {
            if item.kind == "document" && !item.name.is_empty() {
                points.push(PromptPoint {
                    id: item.id.clone(),
                    text: item.name.clone(),
                });
            }
            if item.id.is_empty() {
                continue;
            }
            let child_files = tree
                .iter()
                .filter(|node| {
                    node.is_knowledge() && node.parent_id.as_deref() == Some(item.id.as_str())
                })
                .filter_map(|node| node.file_name.as_deref())
                .filter(|f| !f.is_empty());
            for file_name in child_files {
                if seen_files.insert(file_name.to_string()) {
                    resolve_source(store, file_name, &mut paths).await;
                }
            }
        }
    }

    (paths, points)
}

async fn upload_sources(
    provider: &dyn Provider,
    paths: &[PathBuf],
) -> Result<Vec<String>, ProviderError> {
    let mut file_ids = Vec::new();
    let mut last_error = None;
    for path in paths {
        match provider.upload_file(path, FILE_EXTRACT_PURPOSE).await {
            Ok(uploaded) => file_ids.push(uploaded.id),
            Err(e) => {
                warn!("Upload of {} failed: {}", path.display(), e);
                last_error = Some(e);
            }
        }
    }
    match (file_ids.is_empty(), last_error) {
        (true, Some(e)) => Err(e),
        _ => Ok(file_ids),
    }
}

/// Generate questions for the selected items. Nothing is persisted.
pub async fn generate_questions(
    store: &Store,
    provider: &dyn Provider,
    selected_items: &[SelectedItem],
) -> ApiResult<Vec<QuestionContent>> {
    ensure_requested(selected_items)?;
    let groups = group_by_config(selected_items);

    let tree = KnowledgeTreeRepository::load(store).await?;
    let mut questions = Vec::new();

    for group in &groups {
        let (paths, points) = collect_sources(store, &tree, group).await;
        if paths.is_empty() {
            warn!("No source document found for a group of {} items; skipped", group.len());
            continue;
        }

        let requirements = build_requirements(&group[0].question_types);
        let prompt = build_prompt(&build_knowledge_text(&points), &requirements);

        let file_ids = upload_sources(provider, &paths).await?;
        let mut messages: Vec<ChatMessage> = file_ids
            .iter()
            .map(|id| ChatMessage::file_reference(id))
            .collect();
        messages.push(ChatMessage::user(prompt));

        let response = provider
            .send_conversation(messages, ResponseFormat::JsonObject)
            .await?;
        let text = extract_text(&response).ok_or(ProviderError::NoContent)?;
        let generated = json_match(&text).map(parse_questions).unwrap_or_default();

        if generated.len() != requirements.len() {
            warn!(
                "Expected {} questions, model returned {}",
                requirements.len(),
                generated.len()
            );
        }
        info!(
            "Generated {} questions from {} documents",
            generated.len(),
            paths.len()
        );
        questions.extend(generated);
    }

    if questions.is_empty() {
        return Err(ApiError::BadRequest("No questions could be generated".to_string()));
    }
    Ok(questions)
}
