use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::diagram::render::{RenderError, Renderer};
use crate::git::{find_diagram_source, resolve_commit, CommitLookup, SourceLookup};

/// Rendered PNG bytes.
pub type DiagramBytes = Arc<Vec<u8>>;

/// Errors are cloneable so one generation result can be handed to every
/// request waiting on it.
#[derive(Debug, Clone, Error)]
pub enum DiagramError {
    #[error("invalid commit hash: {0:?}")]
    InvalidHash(String),
    #[error("commit hash {0} is ambiguous")]
    AmbiguousHash(String),
    #[error("commit {0} not found")]
    CommitNotFound(String),
    #[error("no diagram source found in commit {0}")]
    SourceNotFound(String),
    #[error("failed to generate diagram: {0}")]
    RenderFailed(String),
    #[error("diagram generation failed: no PNG written to {0}")]
    GenerationIncomplete(String),
    #[error("failed to store diagram: {0}")]
    MoveFailed(String),
    #[error("diagram generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("repository error: {0}")]
    Repository(String),
    #[error("diagram cache I/O error: {0}")]
    Io(String),
}

impl From<RenderError> for DiagramError {
    fn from(e: RenderError) -> Self {
        match e {
            RenderError::Failed(diagnostic) => DiagramError::RenderFailed(diagnostic),
            RenderError::Timeout(t) => DiagramError::Timeout(t),
        }
    }
}

/// Where a commit's diagram is in its lifecycle.
///
/// Failure is not persisted: a failed commit reports `Absent` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagramStatus {
    Absent,
    Exporting,
    Rendering,
    Cached,
}

type PendingDiagram = Shared<BoxFuture<'static, Result<DiagramBytes, DiagramError>>>;

struct InFlight {
    phase: Arc<Mutex<DiagramStatus>>,
    result: PendingDiagram,
}

/// Generations in progress for one cache directory, keyed by full commit id.
///
/// Every [`DiagramCache`] opened over the same directory must share one
/// table, so a reopened cache joins renders started by the previous one.
#[derive(Default)]
pub struct DiagramJobs {
    entries: Mutex<HashMap<String, InFlight>>,
}

impl DiagramJobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Inner {
    repo_path: PathBuf,
    cache_dir: PathBuf,
    staging_root: PathBuf,
    extensions: Vec<String>,
    renderer: Arc<dyn Renderer>,
    jobs: Arc<DiagramJobs>,
}

/// Content-addressed cache of rendered diagrams, keyed by commit id.
///
/// An artifact on disk is final: the renderer runs at most once per commit,
/// whichever hash prefix a request names it by. Concurrent first requests
/// share a single generation.
#[derive(Clone)]
pub struct DiagramCache {
    inner: Arc<Inner>,
}

impl DiagramCache {
    pub fn new(
        repo_path: &Path,
        cache_dir: &Path,
        staging_root: &Path,
        extensions: Vec<String>,
        renderer: Arc<dyn Renderer>,
        jobs: Arc<DiagramJobs>,
    ) -> std::io::Result<Self> {
        std::fs::create_dir_all(cache_dir)?;
        std::fs::create_dir_all(staging_root)?;
        // The renderer resolves relative output paths against the source file.
        let cache_dir = cache_dir.canonicalize()?;
        let staging_root = staging_root.canonicalize()?;

        Ok(Self {
            inner: Arc::new(Inner {
                repo_path: repo_path.to_path_buf(),
                cache_dir,
                staging_root,
                extensions,
                renderer,
                jobs,
            }),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.inner.cache_dir
    }

    /// Path of the artifact for a full commit id.
    pub fn artifact_path(&self, commit_id: &str) -> PathBuf {
        self.inner.artifact_path(commit_id)
    }

    /// Return the diagram for `hash`, generating it on first request.
    pub async fn get(&self, hash: &str) -> Result<DiagramBytes, DiagramError> {
        let commit_id = self.resolve(hash).await?;
        let artifact = self.inner.artifact_path(&commit_id);

        if let Some(bytes) = read_artifact(&artifact).await? {
            tracing::debug!("Diagram for commit {commit_id} already exists");
            return Ok(bytes);
        }

        let pending = {
            let mut jobs = self.inner.jobs.entries.lock();
            if let Some(existing) = jobs.get(&commit_id) {
                tracing::debug!("Joining in-flight generation for commit {commit_id}");
                Some(existing.result.clone())
            } else if artifact.exists() {
                // Finished between the read above and taking the lock.
                None
            } else {
                let phase = Arc::new(Mutex::new(DiagramStatus::Exporting));
                let task = tokio::spawn(
                    self.inner
                        .clone()
                        .generate(commit_id.clone(), phase.clone()),
                );
                let result = async move {
                    task.await.unwrap_or_else(|e| {
                        Err(DiagramError::Io(format!("generation task failed: {e}")))
                    })
                }
                .boxed()
                .shared();
                jobs.insert(
                    commit_id.clone(),
                    InFlight {
                        phase,
                        result: result.clone(),
                    },
                );
                Some(result)
            }
        };

        match pending {
            Some(pending) => pending.await,
            None => read_artifact(&artifact)
                .await?
                .ok_or_else(|| DiagramError::Io(format!("{} vanished", artifact.display()))),
        }
    }

    /// Current lifecycle phase of the commit `hash` names.
    pub async fn status(&self, hash: &str) -> Result<DiagramStatus, DiagramError> {
        let commit_id = self.resolve(hash).await?;
        if let Some(entry) = self.inner.jobs.entries.lock().get(&commit_id) {
            return Ok(*entry.phase.lock());
        }
        if self.inner.artifact_path(&commit_id).exists() {
            Ok(DiagramStatus::Cached)
        } else {
            Ok(DiagramStatus::Absent)
        }
    }

    /// Delete every cached artifact.
    pub fn clear(&self) -> std::io::Result<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.inner.cache_dir)? {
            let path = entry?.path();
            let is_artifact = path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with("diagram-"))
                .unwrap_or(false);
            if is_artifact && path.is_file() {
                std::fs::remove_file(&path)?;
                removed += 1;
            }
        }
        tracing::info!(
            "Cleared {removed} cached diagrams from {}",
            self.inner.cache_dir.display()
        );
        Ok(removed)
    }

    /// Validate `hash` and expand it to the full id of its commit.
    async fn resolve(&self, hash: &str) -> Result<String, DiagramError> {
        let hash = normalize_hash(hash)?;
        let repo_path = self.inner.repo_path.clone();
        let lookup_hash = hash.clone();
        let lookup = tokio::task::spawn_blocking(move || resolve_commit(&repo_path, &lookup_hash))
            .await
            .map_err(|e| DiagramError::Repository(format!("commit lookup task failed: {e}")))?
            .map_err(|e| DiagramError::Repository(e.message().to_string()))?;

        match lookup {
            CommitLookup::Found(id) => Ok(id),
            CommitLookup::NoCommit => Err(DiagramError::CommitNotFound(hash)),
            CommitLookup::Ambiguous => Err(DiagramError::AmbiguousHash(hash)),
        }
    }
}

impl Inner {
    fn artifact_path(&self, commit_id: &str) -> PathBuf {
        self.cache_dir.join(format!("diagram-{commit_id}.png"))
    }

    /// Run the pipeline once and drop the in-flight entry afterwards, after
    /// the artifact (if any) is in place.
    async fn generate(
        self: Arc<Self>,
        commit_id: String,
        phase: Arc<Mutex<DiagramStatus>>,
    ) -> Result<DiagramBytes, DiagramError> {
        let staging = self.staging_root.join(Uuid::new_v4().to_string());
        let result = self.run_pipeline(&commit_id, &staging, &phase).await;

        if staging.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
                tracing::warn!("Failed to remove staging dir {}: {e}", staging.display());
            }
        }

        match &result {
            Ok(_) => tracing::info!("Diagram for commit {commit_id} cached"),
            Err(e) => tracing::error!("Diagram generation for commit {commit_id} failed: {e}"),
        }
        self.jobs.entries.lock().remove(&commit_id);
        result
    }

    async fn run_pipeline(
        &self,
        commit_id: &str,
        staging: &Path,
        phase: &Mutex<DiagramStatus>,
    ) -> Result<DiagramBytes, DiagramError> {
        tracing::info!("Exporting diagram source for commit {commit_id}");
        let repo_path = self.repo_path.clone();
        let lookup_id = commit_id.to_string();
        let extensions = self.extensions.clone();
        let lookup = tokio::task::spawn_blocking(move || {
            find_diagram_source(&repo_path, &lookup_id, &extensions)
        })
        .await
        .map_err(|e| DiagramError::Repository(format!("source lookup task failed: {e}")))?
        .map_err(|e| DiagramError::Repository(e.message().to_string()))?;

        let source = match lookup {
            SourceLookup::Found(source) => source,
            SourceLookup::NoSource => {
                return Err(DiagramError::SourceNotFound(commit_id.to_string()))
            }
            SourceLookup::NoCommit => {
                return Err(DiagramError::CommitNotFound(commit_id.to_string()))
            }
        };

        let file_name = Path::new(&source.path)
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| DiagramError::Repository(format!("bad source path {}", source.path)))?;
        tokio::fs::create_dir_all(staging)
            .await
            .map_err(|e| DiagramError::Io(format!("creating {}: {e}", staging.display())))?;
        let source_path = staging.join(file_name);
        tokio::fs::write(&source_path, &source.content)
            .await
            .map_err(|e| DiagramError::Io(format!("writing {}: {e}", source_path.display())))?;

        *phase.lock() = DiagramStatus::Rendering;
        tracing::info!("Rendering {} for commit {commit_id}", source.path);
        self.renderer.render(&source_path, staging).await?;

        let staged = find_rendered(staging).await?;
        let artifact = self.artifact_path(commit_id);
        move_into_place(&staged, &artifact).await?;

        read_artifact(&artifact).await?.ok_or_else(|| {
            DiagramError::MoveFailed(format!("{} missing after move", artifact.display()))
        })
    }
}

/// The PNG the renderer wrote into its private staging dir. The name is the
/// tool's choice, so any single `.png` is accepted.
async fn find_rendered(staging: &Path) -> Result<PathBuf, DiagramError> {
    let mut entries = tokio::fs::read_dir(staging)
        .await
        .map_err(|e| DiagramError::Io(format!("reading {}: {e}", staging.display())))?;

    let mut pngs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| DiagramError::Io(format!("reading {}: {e}", staging.display())))?
    {
        let path = entry.path();
        let is_png = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if is_png && path.is_file() {
            pngs.push(path);
        }
    }
    pngs.sort();

    match pngs.len() {
        0 => Err(DiagramError::GenerationIncomplete(
            staging.display().to_string(),
        )),
        1 => Ok(pngs.remove(0)),
        n => {
            tracing::warn!(
                "Renderer wrote {n} images into {}, using {}",
                staging.display(),
                pngs[0].display()
            );
            Ok(pngs.remove(0))
        }
    }
}

/// Rename `from` onto `to`, falling back to a copy when rename fails.
/// `to` only ever appears complete.
async fn move_into_place(from: &Path, to: &Path) -> Result<(), DiagramError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tracing::debug!("Rename failed, copying {} to {}", from.display(), to.display());
    copy_into_place(from, to).await
}

/// Copy `from` next to `to`, rename it over `to`, then delete `from`.
async fn copy_into_place(from: &Path, to: &Path) -> Result<(), DiagramError> {
    let partial = to.with_extension("png.partial");
    if let Err(e) = tokio::fs::copy(from, &partial).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(DiagramError::MoveFailed(format!(
            "copy to {}: {e}",
            partial.display()
        )));
    }
    if let Err(e) = tokio::fs::rename(&partial, to).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(DiagramError::MoveFailed(format!(
            "rename to {}: {e}",
            to.display()
        )));
    }
    if let Err(e) = tokio::fs::remove_file(from).await {
        tracing::warn!("Failed to remove staged diagram {}: {e}", from.display());
    }
    Ok(())
}

async fn read_artifact(path: &Path) -> Result<Option<DiagramBytes>, DiagramError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(Arc::new(bytes))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DiagramError::Io(format!("reading {}: {e}", path.display()))),
    }
}

/// Accept 4 to 40 hex characters, lowercased.
fn normalize_hash(hash: &str) -> Result<String, DiagramError> {
    let hash = hash.trim();
    let valid = (4..=40).contains(&hash.len()) && hash.chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(hash.to_ascii_lowercase())
    } else {
        Err(DiagramError::InvalidHash(hash.to_string()))
    }
}
