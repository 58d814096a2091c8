//! `/api/bank`: quiz composition and quizzes.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, RawQuery, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use d2q_core::tree::build_tree;
use d2q_core::{QuizQuestion, compose, type_statistics};
use d2q_store::{
    KnowledgeTreeRepository, Page, QuestionRepository, QuizQuestionRepository, QuizRepository,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::routes::{ApiJson, ApiQuery, Pagination, non_blank};
use crate::state::AppState;

const MAX_QUIZ_PAGE_SIZE: i64 = 10_000;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quiz/compose", post(compose_quiz))
        .route("/tree/load-for-compose", get(load_tree_for_compose))
        .route("/question/type-statistics", get(question_type_statistics))
        .route("/quiz-bank/list", get(list_quizzes))
        .route("/quiz/{quiz_id}/questions", get(quiz_questions))
        .route("/quiz/create", post(create_quiz))
        .route("/quiz/update-quiz-info", post(attach_pending))
}

#[derive(Debug, Deserialize)]
pub struct ComposeRequest {
    /// Accepted for the client's benefit; candidates come from every bank
    #[serde(default)]
    pub bank_id: Option<String>,
    #[serde(default)]
    pub knowledge_ids: Vec<String>,
    #[serde(default)]
    pub target_counts: BTreeMap<String, i64>,
    #[serde(default)]
    pub quiz_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ComposeTreeQuery {
    pub bank_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuizRequest {
    pub quiz_name: String,
    #[serde(default)]
    pub creator: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttachPendingRequest {
    pub quiz_id: String,
    pub quiz_name: String,
}

#[derive(Debug, Serialize)]
struct QuizQuestionsResponse {
    success: bool,
    #[serde(flatten)]
    page: Page<QuizQuestion>,
}

/// Every `knowledge_ids` value of a query string, in order.
///
/// Repeated keys (`?knowledge_ids=a&knowledge_ids=b`) and the bracketed
/// form are both accepted.
fn knowledge_ids_from_query(query: Option<&str>) -> Vec<String> {
    let Some(query) = query else {
        return Vec::new();
    };
    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(key, _)| key == "knowledge_ids" || key == "knowledge_ids[]")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

/// POST /quiz/compose - pick questions and queue them as pending quiz rows
async fn compose_quiz(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<ComposeRequest>,
) -> ApiResult<Json<Value>> {
    let pool = QuestionRepository::load(&state.store).await?;
    let mut rng = StdRng::from_entropy();
    let composition = compose(
        &pool,
        &request.knowledge_ids,
        &request.target_counts,
        request.quiz_name.trim(),
        &mut rng,
    )?;

    let question_count = QuizQuestionRepository::append(&state.store, composition.questions).await?;
    info!(
        "Composed {} questions from {} knowledge points{}",
        question_count,
        request.knowledge_ids.len(),
        non_blank(&request.bank_id)
            .map(|b| format!(" (bank {b})"))
            .unwrap_or_default()
    );

    Ok(Json(json!({
        "success": true,
        "message": "Quiz composed",
        "question_count": question_count,
        "type_selection": composition.per_type,
    })))
}

/// GET /tree/load-for-compose?bank_id= - nodes with questions plus ancestors
async fn load_tree_for_compose(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<ComposeTreeQuery>,
) -> ApiResult<Json<Value>> {
    let items =
        KnowledgeTreeRepository::filtered_for_compose(&state.store, non_blank(&query.bank_id))
            .await?;
    let tree = build_tree(&items);
    Ok(Json(json!({
        "success": true,
        "items": items,
        "tree": tree,
    })))
}

/// GET /question/type-statistics?knowledge_ids=a&knowledge_ids=b
async fn question_type_statistics(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> ApiResult<Json<Value>> {
    let knowledge_ids = knowledge_ids_from_query(query.as_deref());
    if knowledge_ids.is_empty() {
        return Err(ApiError::BadRequest(
            "knowledge_ids must name at least one knowledge point".to_string(),
        ));
    }

    let questions = QuestionRepository::load(&state.store).await?;
    let stats = type_statistics(&questions, &knowledge_ids);
    Ok(Json(json!({
        "success": true,
        "total": stats.total,
        "type_statistics": stats.type_statistics,
    })))
}

/// GET /quiz-bank/list - newest first
async fn list_quizzes(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let quizs = QuizRepository::list(&state.store).await?;
    Ok(Json(json!({
        "success": true,
        "quizs": quizs,
    })))
}

/// GET /quiz/{quiz_id}/questions?page&page_size
async fn quiz_questions(
    State(state): State<Arc<AppState>>,
    Path(quiz_id): Path<String>,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> ApiResult<Json<QuizQuestionsResponse>> {
    let (page, page_size) = pagination.bounds(Some(MAX_QUIZ_PAGE_SIZE))?;
    let page = QuizQuestionRepository::list_for_quiz(&state.store, &quiz_id, page, page_size).await?;
    Ok(Json(QuizQuestionsResponse {
        success: true,
        page,
    }))
}

/// POST /quiz/create - create a quiz and attach every pending row to it
async fn create_quiz(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<CreateQuizRequest>,
) -> ApiResult<Json<Value>> {
    if request.quiz_name.trim().is_empty() {
        return Err(ApiError::BadRequest("quiz_name must not be empty".to_string()));
    }
    let quiz = QuizRepository::create(&state.store, &request.quiz_name, request.creator.as_deref())
        .await?;
    let attached_count =
        QuizQuestionRepository::attach_pending(&state.store, &quiz.quiz_id, &quiz.quiz_name)
            .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Quiz created",
        "quiz": quiz,
        "attached_count": attached_count,
    })))
}

/// POST /quiz/update-quiz-info - attach every pending row to an existing quiz
async fn attach_pending(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<AttachPendingRequest>,
) -> ApiResult<Json<Value>> {
    let updated_count =
        QuizQuestionRepository::attach_pending(&state.store, &request.quiz_id, &request.quiz_name)
            .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Quiz questions updated",
        "updated_count": updated_count,
    })))
}
