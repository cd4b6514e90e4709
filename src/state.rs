use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::config::Config;
use crate::diagram::{DiagramJobs, PlantUmlRenderer, Renderer};
use crate::error::ApiError;
use crate::llm::LlmServices;
use crate::models::RepoResponse;
use crate::workspace::{namespace_path, Workspace, WorkspaceError};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub http_client: reqwest::Client,
    pub services: LlmServices,
    pub renderer: Arc<dyn Renderer>,
    /// The active repository. Readers hold a read guard for a whole request;
    /// switching takes the write guard.
    workspace: Arc<RwLock<Option<Workspace>>>,
    /// In-flight diagram renders per namespace dir. Outlives any one
    /// workspace so reopening a repository joins its running renders.
    diagram_jobs: Arc<Mutex<HashMap<PathBuf, Arc<DiagramJobs>>>>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let llm_timeout = config.llm.as_ref().map(|l| l.timeout_secs).unwrap_or(120);
        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(llm_timeout))
            .build()?;
        let services = LlmServices::from_config(&http_client, config.llm.as_ref());
        let renderer: Arc<dyn Renderer> = Arc::new(PlantUmlRenderer::new(&config.renderer));
        if !config.renderer.plantuml_jar.exists() {
            tracing::warn!(
                "PlantUML jar not found at {}, diagram requests will fail",
                config.renderer.plantuml_jar.display()
            );
        }
        Self::with_services(config, http_client, services, renderer)
    }

    /// Build state around explicit services and renderer.
    pub fn with_services(
        config: Config,
        http_client: reqwest::Client,
        services: LlmServices,
        renderer: Arc<dyn Renderer>,
    ) -> anyhow::Result<Self> {
        std::fs::create_dir_all(config.repos_dir())?;
        std::fs::create_dir_all(config.workspaces_dir())?;
        std::fs::create_dir_all(config.staging_dir())?;

        Ok(Self {
            config: Arc::new(config),
            http_client,
            services,
            renderer,
            workspace: Arc::new(RwLock::new(None)),
            diagram_jobs: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// The render table for one namespace, created on first use.
    pub fn jobs_for(&self, namespace_dir: &Path) -> Arc<DiagramJobs> {
        self.diagram_jobs
            .lock()
            .entry(namespace_dir.to_path_buf())
            .or_default()
            .clone()
    }

    /// Read access to the active workspace for the lifetime of the guard.
    pub async fn workspace(&self) -> Result<RwLockReadGuard<'_, Workspace>, ApiError> {
        let guard = self.workspace.read().await;
        RwLockReadGuard::try_map(guard, |w| w.as_ref()).map_err(|_| ApiError::no_repository())
    }

    /// Make `repo_path` the active repository.
    ///
    /// With `reset`, the namespace's diagrams are cleared and the store is
    /// rebuilt from history. Otherwise a persisted store is reused and only
    /// an empty one is indexed.
    pub async fn open_repository(
        &self,
        repo_path: &Path,
        reset: bool,
    ) -> Result<RepoResponse, WorkspaceError> {
        let mut active = self.workspace.write().await;

        let workspace = Workspace::open(
            &self.config,
            repo_path,
            self.services.clone(),
            self.renderer.clone(),
            self.jobs_for(&namespace_path(&self.config, repo_path)),
        )?;
        let summary = if reset {
            workspace.reset().await?
        } else if workspace.store().is_empty() {
            workspace.index().await?
        } else {
            workspace.summary()
        };

        tracing::info!(
            "Active repository: {} ({} decisions, embedded: {})",
            summary.repo_path,
            summary.decisions,
            summary.embedded
        );
        *active = Some(workspace);
        Ok(summary)
    }
}
