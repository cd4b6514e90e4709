use crate::llm::Embedder;
use crate::models::EmbeddingSpace;
use crate::store::BatchEmbeddings;

/// What happened when a batch of decisions was sent for embedding.
#[derive(Debug)]
pub enum EmbeddingOutcome {
    /// One vector per message, index-aligned, all of the same dimension
    Embedded(BatchEmbeddings),
    /// No embedding service is configured
    Unavailable,
    /// The service failed or returned unusable vectors
    Failed(String),
}

impl EmbeddingOutcome {
    pub fn into_embeddings(self) -> Option<BatchEmbeddings> {
        match self {
            EmbeddingOutcome::Embedded(emb) => Some(emb),
            _ => None,
        }
    }
}

/// Embed decision messages. Never fails ingestion: errors become
/// [`EmbeddingOutcome::Failed`] and the caller stores records without vectors.
pub async fn embed_messages(
    embedder: Option<&dyn Embedder>,
    messages: &[String],
) -> EmbeddingOutcome {
    let Some(embedder) = embedder else {
        return EmbeddingOutcome::Unavailable;
    };
    if messages.is_empty() {
        return EmbeddingOutcome::Failed("no messages to embed".to_string());
    }

    let vectors = match embedder.embed(messages).await {
        Ok(vectors) => vectors,
        Err(e) => {
            tracing::warn!("Embedding failed, storing decisions without vectors: {e:#}");
            return EmbeddingOutcome::Failed(format!("{e:#}"));
        }
    };

    if vectors.len() != messages.len() {
        let reason = format!(
            "embedding service returned {} vectors for {} messages",
            vectors.len(),
            messages.len()
        );
        tracing::warn!("{reason}");
        return EmbeddingOutcome::Failed(reason);
    }

    let dim = vectors.first().map(Vec::len).unwrap_or(0);
    if dim == 0 || vectors.iter().any(|v| v.len() != dim) {
        let reason = "embedding service returned vectors of inconsistent dimension".to_string();
        tracing::warn!("{reason}");
        return EmbeddingOutcome::Failed(reason);
    }

    tracing::info!("Embedded {} decisions ({dim} dims)", vectors.len());
    EmbeddingOutcome::Embedded(BatchEmbeddings {
        space: EmbeddingSpace {
            model: embedder.model().to_string(),
            dim,
        },
        vectors,
    })
}

#[cfg(test)]
pub(crate) mod fakes {
    //! Deterministic embedders for tests.

    use anyhow::Result;
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::llm::Embedder;

    /// Embeds text as keyword counts over a fixed vocabulary.
    pub struct KeywordEmbedder {
        pub vocabulary: Vec<&'static str>,
        pub calls: AtomicUsize,
    }

    impl KeywordEmbedder {
        pub fn new(vocabulary: Vec<&'static str>) -> Self {
            Self {
                vocabulary,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Embedder for KeywordEmbedder {
        fn model(&self) -> &str {
            "keyword"
        }

        fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let vectors: Vec<Vec<f32>> = texts
                .iter()
                .map(|t| {
                    let lower = t.to_lowercase();
                    self.vocabulary
                        .iter()
                        .map(|word| lower.matches(word).count() as f32)
                        .collect()
                })
                .collect();
            async move { Ok::<_, anyhow::Error>(vectors) }.boxed()
        }
    }

    /// Always fails, like an unreachable service.
    pub struct DownEmbedder;

    impl Embedder for DownEmbedder {
        fn model(&self) -> &str {
            "down"
        }

        fn embed<'a>(&'a self, _texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
            async { Err::<Vec<Vec<f32>>, _>(anyhow::anyhow!("connection refused")) }.boxed()
        }
    }

    /// Returns a fixed set of vectors regardless of input.
    pub struct FixedEmbedder(pub Vec<Vec<f32>>);

    impl Embedder for FixedEmbedder {
        fn model(&self) -> &str {
            "fixed"
        }

        fn embed<'a>(&'a self, _texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
            let vectors = self.0.clone();
            async move { Ok::<_, anyhow::Error>(vectors) }.boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;

    fn messages(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn test_unavailable_without_service() {
        let outcome = embed_messages(None, &messages(&["a"])).await;
        assert!(matches!(outcome, EmbeddingOutcome::Unavailable));
    }

    #[tokio::test]
    async fn test_embeds_index_aligned() {
        let embedder = KeywordEmbedder::new(vec!["cache", "queue"]);
        let outcome = embed_messages(
            Some(&embedder),
            &messages(&["use a cache", "use a queue and a queue"]),
        )
        .await;
        let emb = outcome.into_embeddings().unwrap();
        assert_eq!(emb.space.dim, 2);
        assert_eq!(emb.space.model, "keyword");
        assert_eq!(emb.vectors, vec![vec![1.0, 0.0], vec![0.0, 2.0]]);
    }

    #[tokio::test]
    async fn test_service_error_degrades() {
        let outcome = embed_messages(Some(&DownEmbedder), &messages(&["a"])).await;
        assert!(matches!(outcome, EmbeddingOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_count_mismatch_degrades() {
        let embedder = FixedEmbedder(vec![vec![1.0, 0.0]]);
        let outcome = embed_messages(Some(&embedder), &messages(&["a", "b"])).await;
        assert!(matches!(outcome, EmbeddingOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn test_ragged_dimensions_degrade() {
        let embedder = FixedEmbedder(vec![vec![1.0, 0.0], vec![1.0]]);
        let outcome = embed_messages(Some(&embedder), &messages(&["a", "b"])).await;
        assert!(matches!(outcome, EmbeddingOutcome::Failed(_)));
    }
}
