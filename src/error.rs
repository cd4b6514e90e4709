use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::diagram::DiagramError;
use crate::git::IngestError;
use crate::models::Evidence;
use crate::search::AskError;
use crate::workspace::WorkspaceError;

/// Error returned by HTTP handlers, rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Evidence gathered before a failure, returned alongside the error.
    pub results: Option<Vec<Evidence>>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            results: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn no_repository() -> Self {
        Self::new(
            StatusCode::CONFLICT,
            "No repository is open. POST /repo with {\"repo\": <path or URL>} first",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.results {
            Some(results) => json!({ "error": self.message, "results": results }),
            None => json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        tracing::error!("Ingestion failed: {e}");
        Self::internal(e.to_string())
    }
}

impl From<DiagramError> for ApiError {
    fn from(e: DiagramError) -> Self {
        let status = match &e {
            DiagramError::InvalidHash(_) | DiagramError::AmbiguousHash(_) => StatusCode::BAD_REQUEST,
            DiagramError::CommitNotFound(_) | DiagramError::SourceNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            DiagramError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            DiagramError::RenderFailed(_)
            | DiagramError::GenerationIncomplete(_)
            | DiagramError::MoveFailed(_)
            | DiagramError::Repository(_)
            | DiagramError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<AskError> for ApiError {
    fn from(e: AskError) -> Self {
        match e {
            AskError::EmptyQuestion => Self::bad_request(e.to_string()),
            AskError::Summarization {
                message, results, ..
            } => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("answer synthesis failed: {message}"),
                results: Some(results),
            },
        }
    }
}

impl From<WorkspaceError> for ApiError {
    fn from(e: WorkspaceError) -> Self {
        match e {
            WorkspaceError::InvalidLocation(msg) => Self::bad_request(msg),
            WorkspaceError::Ingest(e) => e.into(),
            WorkspaceError::CloneTimeout(_) => Self::new(StatusCode::GATEWAY_TIMEOUT, e.to_string()),
            WorkspaceError::Clone(_) | WorkspaceError::Other(_) => {
                tracing::error!("Repository switch failed: {e:#}");
                Self::internal(format!("{e:#}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_diagram_errors_map_to_status() {
        let cases = [
            (DiagramError::InvalidHash("zz".into()), StatusCode::BAD_REQUEST),
            (DiagramError::AmbiguousHash("abcd".into()), StatusCode::BAD_REQUEST),
            (DiagramError::SourceNotFound("abcd".into()), StatusCode::NOT_FOUND),
            (DiagramError::CommitNotFound("abcd".into()), StatusCode::NOT_FOUND),
            (DiagramError::RenderFailed("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (DiagramError::MoveFailed("xdev".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (DiagramError::Timeout(Duration::from_secs(1)), StatusCode::GATEWAY_TIMEOUT),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_summarization_error_keeps_results() {
        let err = ApiError::from(AskError::Summarization {
            message: "503".into(),
            method: crate::models::ScoringMethod::Lexical,
            results: vec![Evidence {
                hash: "abc1234".into(),
                message: "m".into(),
                score: 1.0,
            }],
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.results.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_blank_question_is_bad_request() {
        assert_eq!(ApiError::from(AskError::EmptyQuestion).status, StatusCode::BAD_REQUEST);
    }
}
