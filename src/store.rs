use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::models::{CommitRecord, DecisionRecord, EmbeddingSpace};

/// On-disk shape of the decision store.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    rebuilt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    embedding_space: Option<EmbeddingSpace>,
    #[serde(default)]
    records: HashMap<String, DecisionRecord>,
}

/// Embeddings produced for one batch, index-aligned with the batch.
#[derive(Debug, Clone)]
pub struct BatchEmbeddings {
    pub space: EmbeddingSpace,
    pub vectors: Vec<Vec<f32>>,
}

/// Keyed persistent record set for one repository: hash -> decision.
///
/// Every mutation rewrites the whole file through a temp file + rename, so a
/// reader on disk only ever sees a complete snapshot.
pub struct DecisionStore {
    state: RwLock<StoreFile>,
    persist_path: PathBuf,
}

impl DecisionStore {
    pub fn open_or_create(store_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(store_dir)?;
        let persist_path = store_dir.join("decisions.json");

        let state = if persist_path.exists() {
            let data = std::fs::read_to_string(&persist_path)
                .context("Failed to read decision store")?;
            match serde_json::from_str(&data) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(
                        "Decision store at {} is unreadable, starting empty: {e}",
                        persist_path.display()
                    );
                    StoreFile::default()
                }
            }
        } else {
            StoreFile::default()
        };

        Ok(Self {
            state: RwLock::new(state),
            persist_path,
        })
    }

    /// Drop every record and recreate an empty store.
    pub fn rebuild(&self) -> Result<()> {
        let mut state = self.state.write();
        *state = StoreFile {
            rebuilt_at: Some(Utc::now()),
            ..StoreFile::default()
        };
        self.persist(&state)?;
        tracing::info!("Decision store rebuilt at {}", self.persist_path.display());
        Ok(())
    }

    /// Write or overwrite records keyed by hash; later duplicates win.
    ///
    /// Embeddings are attached only when they are aligned with the batch and
    /// belong to the store's embedding space. Otherwise the records are stored
    /// without vectors.
    pub fn upsert(&self, batch: &[CommitRecord], embeddings: Option<BatchEmbeddings>) -> Result<()> {
        let mut state = self.state.write();

        let vectors = match embeddings {
            Some(emb) if emb.vectors.len() != batch.len() => {
                tracing::warn!(
                    "Got {} embeddings for {} decisions, storing without vectors",
                    emb.vectors.len(),
                    batch.len()
                );
                None
            }
            Some(emb) => match state.embedding_space.clone() {
                Some(space) if space != emb.space => {
                    tracing::warn!(
                        "Embedding space {:?} does not match stored {:?}, storing without vectors",
                        emb.space,
                        space
                    );
                    None
                }
                _ => {
                    state.embedding_space = Some(emb.space);
                    Some(emb.vectors)
                }
            },
            None => None,
        };

        for (i, commit) in batch.iter().enumerate() {
            let embedding = vectors.as_ref().and_then(|v| v.get(i).cloned());
            state.records.insert(
                commit.hash.clone(),
                DecisionRecord {
                    hash: commit.hash.clone(),
                    message: commit.message.clone(),
                    parents: commit.parents.clone(),
                    sequence: commit.sequence,
                    embedding,
                },
            );
        }

        self.persist(&state)
    }

    /// Every stored record, in no particular order.
    pub fn all(&self) -> Vec<DecisionRecord> {
        self.state.read().records.values().cloned().collect()
    }

    pub fn embeddings_present(&self) -> bool {
        self.state
            .read()
            .records
            .values()
            .any(|r| r.embedding.is_some())
    }

    pub fn embedding_space(&self) -> Option<EmbeddingSpace> {
        self.state.read().embedding_space.clone()
    }

    pub fn rebuilt_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().rebuilt_at
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, state: &StoreFile) -> Result<()> {
        let data = serde_json::to_string(state)?;
        let tmp_path = self.persist_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, data).context("Failed to write decision store")?;
        std::fs::rename(&tmp_path, &self.persist_path)
            .context("Failed to replace decision store")?;
        Ok(())
    }
}
