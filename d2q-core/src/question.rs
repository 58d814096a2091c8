//! Question records and their expanded listing view.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::serde_util::{lenient_opt_string, lenient_string, lenient_string_list};

/// Question types understood by the composer and the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    Essay,
}

impl QuestionType {
    pub const ALL: [QuestionType; 4] = [
        QuestionType::SingleChoice,
        QuestionType::MultipleChoice,
        QuestionType::TrueFalse,
        QuestionType::Essay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::Essay => "essay",
        }
    }

    /// Human-readable label used in generation prompts.
    pub fn label(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "单选题",
            QuestionType::MultipleChoice => "多选题",
            QuestionType::TrueFalse => "判断题",
            QuestionType::Essay => "问答题",
        }
    }

    /// Case-insensitive lookup, `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_kind() -> String {
    QuestionType::SingleChoice.as_str().to_string()
}

/// The question body as generated by the model or edited by a user.
///
/// `kind` is kept as written so that unknown types survive a round trip;
/// use [`QuestionContent::question_type`] to interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionContent {
    #[serde(rename = "type", default = "default_kind", deserialize_with = "lenient_string")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub question: String,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub options: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub answer: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub difficulty: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub score: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub explanation: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub knowledge: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub knowledge_id: Option<String>,
}

impl Default for QuestionContent {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            question: String::new(),
            options: Vec::new(),
            answer: String::new(),
            difficulty: String::new(),
            score: String::new(),
            explanation: String::new(),
            knowledge: String::new(),
            knowledge_id: None,
        }
    }
}

impl QuestionContent {
    pub fn question_type(&self) -> Option<QuestionType> {
        QuestionType::parse(&self.kind)
    }

    /// True when `kind` names `ty`, ignoring case.
    pub fn is_type(&self, ty: &str) -> bool {
        self.kind.trim().eq_ignore_ascii_case(ty.trim())
    }
}

/// A stored question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question_id: String,
    pub created_time: String,
    #[serde(default)]
    pub knowledge_id: Option<String>,
    #[serde(default)]
    pub bank_id: Option<String>,
    pub question_content: QuestionContent,
}

impl QuestionRecord {
    /// New record with a fresh id. `knowledge_id` is copied from the content.
    pub fn new(
        content: QuestionContent,
        bank_id: Option<String>,
        created_time: impl Into<String>,
    ) -> Self {
        Self {
            question_id: Uuid::new_v4().to_string(),
            created_time: created_time.into(),
            knowledge_id: content.knowledge_id.clone(),
            bank_id,
            question_content: content,
        }
    }

    pub fn expand(&self) -> ExpandedQuestion {
        let c = &self.question_content;
        ExpandedQuestion {
            question_id: self.question_id.clone(),
            created_time: self.created_time.clone(),
            knowledge_id: self.knowledge_id.clone(),
            bank_id: self.bank_id.clone(),
            kind: c.kind.clone(),
            question: c.question.clone(),
            options: c.options.clone(),
            answer: c.answer.clone(),
            difficulty: c.difficulty.clone(),
            score: c.score.clone(),
            explanation: c.explanation.clone(),
            knowledge: c.knowledge.clone(),
        }
    }
}

/// A record with its content lifted next to the metadata, as listed to
/// clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedQuestion {
    pub question_id: String,
    pub created_time: String,
    pub knowledge_id: Option<String>,
    pub bank_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
    pub difficulty: String,
    pub score: String,
    pub explanation: String,
    pub knowledge: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_question_type_parse() {
        assert_eq!(QuestionType::parse("ESSAY"), Some(QuestionType::Essay));
        assert_eq!(QuestionType::parse(" true_false "), Some(QuestionType::TrueFalse));
        assert_eq!(QuestionType::parse("fill_blank"), None);
    }

    #[test]
    fn test_content_accepts_model_output() {
        let content: QuestionContent = serde_json::from_value(json!({
            "question": "2 + 2 = ?",
            "options": ["3", 4],
            "answer": ["B"],
            "score": 2,
            "knowledge_id": 17
        }))
        .unwrap();
        assert_eq!(content.kind, "single_choice");
        assert_eq!(content.options, vec!["3", "4"]);
        assert_eq!(content.answer, "B");
        assert_eq!(content.score, "2");
        assert_eq!(content.knowledge_id.as_deref(), Some("17"));
        assert_eq!(content.question_type(), Some(QuestionType::SingleChoice));
    }

    #[test]
    fn test_record_expands_content() {
        let content = QuestionContent {
            kind: "Essay".to_string(),
            question: "Why?".to_string(),
            knowledge_id: Some("k1".to_string()),
            ..QuestionContent::default()
        };
        let record = QuestionRecord::new(content, Some("bank_1".into()), "2024-01-01T00:00:00Z");
        assert_eq!(record.knowledge_id.as_deref(), Some("k1"));
        assert!(record.question_content.is_type("essay"));

        let value = serde_json::to_value(record.expand()).unwrap();
        assert_eq!(value["type"], "Essay");
        assert_eq!(value["bank_id"], "bank_1");
        assert_eq!(value["question_id"], record.question_id.as_str());
        assert!(value.get("question_content").is_none());
    }

    #[test]
    fn test_record_accepts_missing_bank() {
        let record: QuestionRecord = serde_json::from_value(json!({
            "question_id": "q1",
            "created_time": "t",
            "question_content": {"type": "true_false", "question": "Sky is blue"}
        }))
        .unwrap();
        assert_eq!(record.bank_id, None);
        assert_eq!(record.knowledge_id, None);
    }
}
