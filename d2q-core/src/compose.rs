//! Quiz composition and per-type statistics over stored questions.

use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bank::QuizQuestion;
use crate::error::{CoreError, CoreResult};
use crate::question::{QuestionRecord, QuestionType};

/// Outcome for one requested question type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSelection {
    pub question_type: String,
    pub requested: i64,
    pub available: usize,
    pub selected: usize,
}

/// Questions picked for a quiz, as pending rows, plus per-type statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub questions: Vec<QuizQuestion>,
    pub per_type: Vec<TypeSelection>,
}

fn dedup_ids(ids: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .collect()
}

/// Pick questions for a quiz.
///
/// For every type with a positive target the candidates are the questions of
/// that type attached to one of `knowledge_ids`. Each knowledge point first
/// contributes up to `target / knowledge_ids.len()` random questions, then the
/// remainder is filled at random from whatever is left. A type never yields
/// more questions than it has candidates, and no question is picked twice.
///
/// Types are processed in key order of `target_counts`.
pub fn compose<R: Rng + ?Sized>(
    questions: &[QuestionRecord],
    knowledge_ids: &[String],
    target_counts: &BTreeMap<String, i64>,
    quiz_name: &str,
    rng: &mut R,
) -> CoreResult<Composition> {
    if questions.is_empty() {
        return Err(CoreError::EmptyQuestionPool);
    }
    let knowledge_ids = dedup_ids(knowledge_ids);
    if knowledge_ids.is_empty() {
        return Err(CoreError::NoKnowledgeSelected);
    }
    let wanted: HashSet<&str> = knowledge_ids.iter().copied().collect();

    let mut picked: Vec<&QuestionRecord> = Vec::new();
    let mut per_type = Vec::new();

    for (question_type, &target) in target_counts {
        if target <= 0 {
            continue;
        }

        let candidates: Vec<&QuestionRecord> = questions
            .iter()
            .filter(|q| q.question_content.is_type(question_type))
            .filter(|q| q.knowledge_id.as_deref().is_some_and(|k| wanted.contains(k)))
            .collect();

        if candidates.is_empty() {
            warn!(
                "No {} questions are attached to the selected knowledge points",
                question_type
            );
        }

        let target = target as usize;
        let quota = target / knowledge_ids.len();
        let mut used: HashSet<&str> = HashSet::new();
        let mut selected: Vec<&QuestionRecord> = Vec::new();

        if quota > 0 {
            for &knowledge_id in &knowledge_ids {
                let pool: Vec<&QuestionRecord> = candidates
                    .iter()
                    .copied()
                    .filter(|q| q.knowledge_id.as_deref() == Some(knowledge_id))
                    .filter(|q| !used.contains(q.question_id.as_str()))
                    .collect();
                for &q in pool.choose_multiple(rng, quota) {
                    used.insert(q.question_id.as_str());
                    selected.push(q);
                }
            }
        }

        let missing = target.saturating_sub(selected.len());
        if missing > 0 {
            let rest: Vec<&QuestionRecord> = candidates
                .iter()
                .copied()
                .filter(|q| !used.contains(q.question_id.as_str()))
                .collect();
            for &q in rest.choose_multiple(rng, missing) {
                used.insert(q.question_id.as_str());
                selected.push(q);
            }
        }

        debug!(
            "Composed {} of {} requested {} questions ({} available)",
            selected.len(),
            target,
            question_type,
            candidates.len()
        );

        per_type.push(TypeSelection {
            question_type: question_type.clone(),
            requested: target as i64,
            available: candidates.len(),
            selected: selected.len(),
        });
        picked.extend(selected);
    }

    let questions = picked
        .into_iter()
        .map(|q| QuizQuestion::pending(quiz_name, q.question_id.clone(), q.question_content.clone()))
        .collect();

    Ok(Composition {
        questions,
        per_type,
    })
}

/// Question counts per known type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCounts {
    pub single_choice: usize,
    pub multiple_choice: usize,
    pub true_false: usize,
    pub essay: usize,
}

impl TypeCounts {
    fn bump(&mut self, ty: QuestionType) {
        match ty {
            QuestionType::SingleChoice => self.single_choice += 1,
            QuestionType::MultipleChoice => self.multiple_choice += 1,
            QuestionType::TrueFalse => self.true_false += 1,
            QuestionType::Essay => self.essay += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeStatistics {
    /// Matching questions, including those of an unknown type
    pub total: usize,
    pub type_statistics: TypeCounts,
}

/// Count the questions attached to any of `knowledge_ids`, by type.
pub fn type_statistics(questions: &[QuestionRecord], knowledge_ids: &[String]) -> TypeStatistics {
    let wanted: HashSet<&str> = dedup_ids(knowledge_ids).into_iter().collect();
    let mut stats = TypeStatistics::default();
    if wanted.is_empty() {
        return stats;
    }

    for q in questions {
        if !q.knowledge_id.as_deref().is_some_and(|k| wanted.contains(k)) {
            continue;
        }
        stats.total += 1;
        if let Some(ty) = q.question_content.question_type() {
            stats.type_statistics.bump(ty);
        }
    }

    stats
}
