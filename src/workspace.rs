use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::diagram::{DiagramCache, DiagramJobs, Renderer};
use crate::git::{self, IngestError, RepoLocation};
use crate::llm::indexer::{embed_messages, EmbeddingOutcome};
use crate::llm::LlmServices;
use crate::models::{CommitRecord, RepoResponse};
use crate::search::QueryEngine;
use crate::store::DecisionStore;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("{0}")]
    InvalidLocation(String),
    #[error("clone failed: {0}")]
    Clone(String),
    #[error("clone timed out after {0:?}")]
    CloneTimeout(Duration),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Everything scoped to one repository: its decision store and diagram
/// cache, both under `<data>/workspaces/<namespace>`.
pub struct Workspace {
    repo_path: PathBuf,
    namespace_dir: PathBuf,
    store: Arc<DecisionStore>,
    diagrams: DiagramCache,
    services: LlmServices,
    git_timeout: Duration,
}

/// Stable namespace for a repository location.
pub fn namespace_id(location: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, location.as_bytes())
}

/// Directory holding the namespace for `repo_path`.
pub fn namespace_path(config: &Config, repo_path: &Path) -> PathBuf {
    config
        .workspaces_dir()
        .join(namespace_id(&repo_path.to_string_lossy()).to_string())
}

impl Workspace {
    /// Open (or create) the namespace for `repo_path` without touching its
    /// contents. `jobs` must be the table every earlier open of this
    /// namespace used, so renders already running are joined.
    pub fn open(
        config: &Config,
        repo_path: &Path,
        services: LlmServices,
        renderer: Arc<dyn Renderer>,
        jobs: Arc<DiagramJobs>,
    ) -> anyhow::Result<Self> {
        let namespace = namespace_id(&repo_path.to_string_lossy());
        let namespace_dir = namespace_path(config, repo_path);
        let store = DecisionStore::open_or_create(&namespace_dir)?;
        let diagrams = DiagramCache::new(
            repo_path,
            &namespace_dir.join("diagrams"),
            &config.staging_dir(),
            config.renderer.source_extensions.clone(),
            renderer,
            jobs,
        )
        .with_context(|| format!("Failed to prepare diagram cache in {}", namespace_dir.display()))?;

        tracing::info!(
            "Opened workspace {namespace} for {} ({} decisions stored)",
            repo_path.display(),
            store.len()
        );

        Ok(Self {
            repo_path: repo_path.to_path_buf(),
            namespace_dir,
            store: Arc::new(store),
            diagrams,
            services,
            git_timeout: config.git_timeout(),
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn namespace_dir(&self) -> &Path {
        &self.namespace_dir
    }

    pub fn store(&self) -> &Arc<DecisionStore> {
        &self.store
    }

    pub fn diagrams(&self) -> &DiagramCache {
        &self.diagrams
    }

    pub fn query_engine(&self) -> QueryEngine {
        QueryEngine::new(self.store.clone(), self.services.clone())
    }

    /// Current commit history, newest first.
    pub async fn commits(&self) -> Result<Vec<CommitRecord>, IngestError> {
        git::read_commits(&self.repo_path, self.git_timeout).await
    }

    /// Re-ingest history into a freshly rebuilt store, embedding messages
    /// when an embedding service is available.
    ///
    /// History is read before the store is touched, so a failed ingestion
    /// leaves the previous contents in place.
    pub async fn index(&self) -> Result<RepoResponse, WorkspaceError> {
        let commits = self.commits().await?;
        self.store.rebuild()?;

        let messages: Vec<String> = commits.iter().map(|c| c.message.clone()).collect();
        let outcome = embed_messages(self.services.embedder.as_deref(), &messages).await;
        match &outcome {
            EmbeddingOutcome::Embedded(emb) => tracing::info!(
                "Embedded {} decisions with {} (dim {})",
                emb.vectors.len(),
                emb.space.model,
                emb.space.dim
            ),
            EmbeddingOutcome::Unavailable => {
                tracing::info!("No embedding service, storing decisions without vectors")
            }
            EmbeddingOutcome::Failed(reason) => {
                tracing::warn!("Storing decisions without vectors: {reason}")
            }
        }

        self.store.upsert(&commits, outcome.into_embeddings())?;
        tracing::info!(
            "Indexed {} decisions from {}",
            self.store.len(),
            self.repo_path.display()
        );
        Ok(self.summary())
    }

    /// Start this namespace over: drop cached diagrams, then re-index.
    pub async fn reset(&self) -> Result<RepoResponse, WorkspaceError> {
        self.diagrams.clear().context("Failed to clear diagram cache")?;
        self.index().await
    }

    pub fn summary(&self) -> RepoResponse {
        RepoResponse {
            repo_path: self.repo_path.display().to_string(),
            decisions: self.store.len(),
            embedded: self.store.embeddings_present(),
            indexed_at: self.store.rebuilt_at(),
        }
    }
}

/// Turn user input into a local repository path, cloning remotes into
/// `<data>/repos/<namespace>`.
pub async fn resolve_repository(config: &Config, input: &str) -> Result<PathBuf, WorkspaceError> {
    let location =
        git::resolve_location(input).map_err(|e| WorkspaceError::InvalidLocation(format!("{e:#}")))?;

    match location {
        RepoLocation::Local(path) => {
            git::ensure_repository(&path)
                .map_err(|e| WorkspaceError::InvalidLocation(format!("{e:#}")))?;
            Ok(path)
        }
        RepoLocation::Remote(url) => {
            let target = config.repos_dir().join(namespace_id(&url).to_string());
            std::fs::create_dir_all(config.repos_dir()).context("Failed to create repos dir")?;

            let timeout = config.clone_timeout();
            let token = config.git_token.clone();
            let clone_target = target.clone();
            let clone_result = tokio::time::timeout(
                timeout,
                tokio::task::spawn_blocking(move || {
                    git::clone_repo(&url, &clone_target, token.as_deref())
                }),
            )
            .await;

            match clone_result {
                Ok(Ok(Ok(()))) => Ok(target),
                Ok(Ok(Err(e))) => Err(WorkspaceError::Clone(format!("{e:#}"))),
                Ok(Err(e)) => Err(WorkspaceError::Clone(format!("clone task failed: {e}"))),
                Err(_) => {
                    tracing::error!("Clone timed out after {}s", timeout.as_secs());
                    Err(WorkspaceError::CloneTimeout(timeout))
                }
            }
        }
    }
}
