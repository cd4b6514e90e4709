use axum::extract::State;
use axum::Json;

use crate::error::ApiError;
use crate::models::{RepoRequest, RepoResponse};
use crate::state::AppState;
use crate::workspace::resolve_repository;

/// POST /repo - Switch to another repository and rebuild its decisions
///
/// `repo` is a local checkout or a clonable URL. The switch waits for
/// in-flight reads of the previous repository to finish.
pub async fn switch_repo(
    State(state): State<AppState>,
    Json(req): Json<RepoRequest>,
) -> Result<Json<RepoResponse>, ApiError> {
    let input = req.repo.as_deref().map(str::trim).unwrap_or_default();
    if input.is_empty() {
        return Err(ApiError::bad_request("repo is required"));
    }

    tracing::info!("Switching repository to {input}");
    let repo_path = resolve_repository(&state.config, input).await?;
    let summary = state.open_repository(&repo_path, true).await?;
    Ok(Json(summary))
}

/// GET /repo - The active repository
pub async fn current_repo(State(state): State<AppState>) -> Result<Json<RepoResponse>, ApiError> {
    let workspace = state.workspace().await?;
    Ok(Json(workspace.summary()))
}
