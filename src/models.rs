use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One decision event parsed from the history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub hash: String,
    pub parents: Vec<String>,
    pub message: String,
    /// Position in the newest-first ingestion order. Not an identity.
    #[serde(skip_serializing)]
    #[serde(default)]
    pub sequence: usize,
}

/// A persisted decision, keyed by commit hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub hash: String,
    pub message: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub sequence: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// The model and dimensionality every stored embedding belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingSpace {
    pub model: String,
    pub dim: usize,
}

/// How the scores in a [`Retrieval`] were produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMethod {
    /// Cosine similarity against the question embedding.
    Vector,
    /// Conjunctive substring match ranked by earliest token position.
    Lexical,
}

/// A single ranked piece of evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub hash: String,
    pub message: String,
    /// Higher is better for both scoring methods.
    pub score: f32,
}

/// Ranked evidence from exactly one retrieval strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Retrieval {
    pub method: ScoringMethod,
    pub evidence: Vec<Evidence>,
}

/// Answer to a question: evidence plus an optional synthesized answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    pub method: ScoringMethod,
    pub results: Vec<Evidence>,
}

/// Commit as returned by `GET /commits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitView {
    pub hash: String,
    pub parents: Vec<String>,
    pub message: String,
}

impl From<CommitRecord> for CommitView {
    fn from(c: CommitRecord) -> Self {
        Self {
            hash: c.hash,
            parents: c.parents,
            message: c.message,
        }
    }
}

/// Switch-repository request
#[derive(Debug, Clone, Deserialize)]
pub struct RepoRequest {
    pub repo: Option<String>,
}

/// Summary of the active repository
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoResponse {
    pub repo_path: String,
    pub decisions: usize,
    pub embedded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<DateTime<Utc>>,
}

/// Ask request
#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub question: Option<String>,
}
