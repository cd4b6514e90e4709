use axum::extract::State;
use axum::Json;

use crate::error::ApiError;
use crate::models::CommitView;
use crate::state::AppState;

/// GET /commits - Decision history of the active repository, newest first
pub async fn list_commits(State(state): State<AppState>) -> Result<Json<Vec<CommitView>>, ApiError> {
    let workspace = state.workspace().await?;
    let commits = workspace.commits().await?;
    Ok(Json(commits.into_iter().map(CommitView::from).collect()))
}
