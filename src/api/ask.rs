use axum::extract::State;
use axum::Json;

use crate::error::ApiError;
use crate::models::{AskRequest, QueryResult};
use crate::state::AppState;

/// POST /ask - Answer a question from the active repository's decisions
pub async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<QueryResult>, ApiError> {
    let question = req.question.unwrap_or_default();
    if question.trim().is_empty() {
        return Err(ApiError::bad_request("question is required"));
    }

    let workspace = state.workspace().await?;
    let result = workspace.query_engine().ask(&question).await?;
    tracing::info!(
        "Answered with {} {:?} results",
        result.results.len(),
        result.method
    );
    Ok(Json(result))
}
