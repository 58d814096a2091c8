//! Quizzes and the questions placed on them.

use d2q_core::timestamp::now_iso;
use d2q_core::{Quiz, QuizQuestion};
use tracing::info;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::store::{DataFile, Page, Store};

const DEFAULT_CREATOR: &str = "system";

/// Quiz repository
pub struct QuizRepository;

impl QuizRepository {
    pub async fn create(store: &Store, quiz_name: &str, creator: Option<&str>) -> StoreResult<Quiz> {
        let quiz = Quiz {
            quiz_id: Uuid::new_v4().to_string(),
            quiz_name: quiz_name.trim().to_string(),
            creator: creator
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(DEFAULT_CREATOR)
                .to_string(),
            created_time: now_iso(),
        };

        store
            .update(DataFile::Quizzes, |quizzes: &mut Vec<Quiz>| {
                quizzes.push(quiz.clone());
                Ok(())
            })
            .await?;

        info!("Created quiz {} ({})", quiz.quiz_name, quiz.quiz_id);
        Ok(quiz)
    }

    /// All quizzes, newest first.
    pub async fn list(store: &Store) -> StoreResult<Vec<Quiz>> {
        let mut quizzes: Vec<Quiz> = store.read(DataFile::Quizzes).await?;
        quizzes.sort_by(|a, b| b.created_time.cmp(&a.created_time));
        Ok(quizzes)
    }
}

/// Quiz question repository
pub struct QuizQuestionRepository;

impl QuizQuestionRepository {
    /// Append composed rows. Returns the number of rows added.
    pub async fn append(store: &Store, rows: Vec<QuizQuestion>) -> StoreResult<usize> {
        let added = rows.len();
        store
            .update(DataFile::QuizQuestions, |stored: &mut Vec<QuizQuestion>| {
                stored.extend(rows);
                info!("Quiz questions file now holds {} rows", stored.len());
                Ok(())
            })
            .await?;
        Ok(added)
    }

    /// Attach every pending row to `quiz_id`. Returns how many were attached.
    pub async fn attach_pending(store: &Store, quiz_id: &str, quiz_name: &str) -> StoreResult<usize> {
        store
            .update(DataFile::QuizQuestions, |stored: &mut Vec<QuizQuestion>| {
                let mut updated = 0;
                for row in stored.iter_mut().filter(|row| row.is_pending()) {
                    row.quiz_id = quiz_id.to_string();
                    row.quiz_name = quiz_name.to_string();
                    updated += 1;
                }
                if updated > 0 {
                    info!("Attached {} pending questions to quiz {}", updated, quiz_id);
                }
                Ok(updated)
            })
            .await
    }

    /// Rows of one quiz ordered by question id.
    pub async fn list_for_quiz(
        store: &Store,
        quiz_id: &str,
        page: usize,
        page_size: usize,
    ) -> StoreResult<Page<QuizQuestion>> {
        let mut rows: Vec<QuizQuestion> = store
            .read::<QuizQuestion>(DataFile::QuizQuestions)
            .await?
            .into_iter()
            .filter(|row| row.quiz_id == quiz_id)
            .collect();
        rows.sort_by(|a, b| a.question_id.cmp(&b.question_id));
        Ok(Page::of(rows, page, page_size))
    }
}
