//! `/api/bank`: question banks and stored questions.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use d2q_core::{QuestionBank, QuestionContent};
use d2q_store::{QuestionBankRepository, QuestionPage, QuestionRepository};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::routes::{ApiJson, ApiQuery, Pagination, non_blank};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bank/create", post(create_bank))
        .route("/bank/list", get(list_banks))
        .route("/question/save", post(save_questions))
        .route("/question/update", post(update_question))
        .route("/question/update-bank", post(update_question_bank))
        .route("/question/list", get(list_questions))
        .route("/question/delete", delete(delete_question))
}

#[derive(Debug, Deserialize)]
pub struct CreateBankRequest {
    pub bank_name: String,
    #[serde(default)]
    pub creator: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveQuestionsRequest {
    pub questions: Vec<QuestionContent>,
    #[serde(default)]
    pub bank_id: Option<String>,
}

/// Question id plus the replacement content fields at the top level
#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub question_id: String,
    #[serde(flatten)]
    pub content: QuestionContent,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBankRequest {
    pub question_id: String,
    pub bank_id: String,
}

#[derive(Debug, Deserialize)]
pub struct BankFilter {
    pub bank_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuestionQuery {
    pub question_id: String,
}

#[derive(Debug, Serialize)]
struct BankListResponse {
    success: bool,
    banks: Vec<QuestionBank>,
}

#[derive(Debug, Serialize)]
struct QuestionListResponse {
    success: bool,
    #[serde(flatten)]
    page: QuestionPage,
}

/// POST /bank/create
async fn create_bank(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<CreateBankRequest>,
) -> ApiResult<Json<Value>> {
    if request.bank_name.trim().is_empty() {
        return Err(ApiError::BadRequest("bank_name must not be empty".to_string()));
    }
    let bank = QuestionBankRepository::create(
        &state.store,
        &request.bank_name,
        request.creator.as_deref(),
    )
    .await?;
    Ok(Json(json!({
        "success": true,
        "bank": bank,
    })))
}

/// GET /bank/list - newest first
async fn list_banks(State(state): State<Arc<AppState>>) -> ApiResult<Json<BankListResponse>> {
    let banks = QuestionBankRepository::list(&state.store).await?;
    Ok(Json(BankListResponse {
        success: true,
        banks,
    }))
}

/// POST /question/save - store a batch of questions
async fn save_questions(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<SaveQuestionsRequest>,
) -> ApiResult<Json<Value>> {
    let question_count = request.questions.len();
    let bank_id = non_blank(&request.bank_id).map(str::to_string);
    let batch = QuestionRepository::save_batch(&state.store, request.questions, bank_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Questions saved",
        "question_id": batch.question_id,
        "question_ids": batch.question_ids,
        "created_time": batch.created_time,
        "question_count": question_count,
    })))
}

/// POST /question/update - replace a stored question's content
async fn update_question(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<UpdateQuestionRequest>,
) -> ApiResult<Json<Value>> {
    let record =
        QuestionRepository::update_content(&state.store, &request.question_id, request.content)
            .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Question updated",
        "question": record.expand(),
    })))
}

/// POST /question/update-bank - file a saved batch into a bank
async fn update_question_bank(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<UpdateBankRequest>,
) -> ApiResult<Json<Value>> {
    let updated_count =
        QuestionRepository::assign_bank_to_batch(&state.store, &request.question_id, &request.bank_id)
            .await?;
    Ok(Json(json!({
        "success": true,
        "message": "Questions linked to bank",
        "updated_count": updated_count,
    })))
}

/// GET /question/list?page&page_size&bank_id
async fn list_questions(
    State(state): State<Arc<AppState>>,
    ApiQuery(pagination): ApiQuery<Pagination>,
    ApiQuery(filter): ApiQuery<BankFilter>,
) -> ApiResult<Json<QuestionListResponse>> {
    let (page, page_size) = pagination.bounds(None)?;
    let page =
        QuestionRepository::list(&state.store, page, page_size, non_blank(&filter.bank_id)).await?;
    Ok(Json(QuestionListResponse {
        success: true,
        page,
    }))
}

/// DELETE /question/delete?question_id=
async fn delete_question(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<DeleteQuestionQuery>,
) -> ApiResult<Json<Value>> {
    QuestionRepository::delete(&state.store, &query.question_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Question deleted",
    })))
}
