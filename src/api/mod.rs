//! Axum HTTP handlers.

pub mod ask;
pub mod commits;
pub mod diagram;
pub mod repo;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// All routes, bound to `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/commits", get(commits::list_commits))
        .route("/diagram/{hash}", get(diagram::get_diagram))
        .route("/diagram/{hash}/status", get(diagram::diagram_status))
        .route("/repo", get(repo::current_repo).post(repo::switch_repo))
        .route("/ask", post(ask::ask))
        .with_state(state)
}
