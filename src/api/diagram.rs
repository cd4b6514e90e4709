use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::diagram::DiagramStatus;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DiagramStatusResponse {
    pub hash: String,
    pub status: DiagramStatus,
}

/// GET /diagram/{hash} - Rendered decision diagram for one commit
///
/// Served from the cache when present; the first request for a hash renders
/// it, and concurrent first requests share that render.
pub async fn get_diagram(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let workspace = state.workspace().await?;
    let bytes = workspace.diagrams().get(&hash).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes.as_ref().clone()))
}

/// GET /diagram/{hash}/status - Where a diagram is in its lifecycle
pub async fn diagram_status(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<DiagramStatusResponse>, ApiError> {
    let workspace = state.workspace().await?;
    let status = workspace.diagrams().status(&hash).await?;
    Ok(Json(DiagramStatusResponse { hash, status }))
}
