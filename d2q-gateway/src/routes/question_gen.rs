//! `/api/quiz`: question generation and generation history.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use d2q_store::QuestionRepository;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::ApiResult;
use crate::routes::ApiJson;
use crate::services::generation::{self, SelectedItem};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/generate", post(generate))
        .route("/history", get(history))
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub selected_items: Vec<SelectedItem>,
}

/// POST /generate - draft questions; nothing is stored
async fn generate(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<GenerateRequest>,
) -> ApiResult<Json<Value>> {
    generation::ensure_requested(&request.selected_items)?;
    let provider = state.provider()?;
    let questions =
        generation::generate_questions(&state.store, provider.as_ref(), &request.selected_items)
            .await?;
    Ok(Json(json!({
        "success": true,
        "questions": questions,
    })))
}

/// GET /history - every stored question, newest first
async fn history(State(state): State<Arc<AppState>>) -> ApiResult<Json<Value>> {
    let history = QuestionRepository::history(&state.store).await?;
    Ok(Json(json!({
        "success": true,
        "history": history,
    })))
}
