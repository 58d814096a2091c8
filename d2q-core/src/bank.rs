//! Question banks, quizzes and quiz membership rows.

use serde::{Deserialize, Serialize};

use crate::question::QuestionContent;

/// A named collection of saved questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionBank {
    /// `bank_<unix millis>`
    pub bank_id: String,
    pub bank_name: String,
    pub creator: String,
    pub created_time: String,
}

/// An exam paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub quiz_id: String,
    pub quiz_name: String,
    pub creator: String,
    pub created_time: String,
}

/// A question placed on a quiz.
///
/// Rows produced by composition start with an empty `quiz_id` and are
/// attached once the quiz is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(default)]
    pub quiz_id: String,
    #[serde(default)]
    pub quiz_name: String,
    pub question_id: String,
    pub question_content: QuestionContent,
}

impl QuizQuestion {
    pub fn pending(
        quiz_name: impl Into<String>,
        question_id: impl Into<String>,
        question_content: QuestionContent,
    ) -> Self {
        Self {
            quiz_id: String::new(),
            quiz_name: quiz_name.into(),
            question_id: question_id.into(),
            question_content,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.quiz_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pending_row() {
        let row = QuizQuestion::pending("Midterm", "q1", QuestionContent::default());
        assert!(row.is_pending());

        let attached: QuizQuestion = serde_json::from_value(json!({
            "quiz_id": "abc",
            "quiz_name": "Midterm",
            "question_id": "q1",
            "question_content": {"type": "essay"}
        }))
        .unwrap();
        assert!(!attached.is_pending());
    }
}
