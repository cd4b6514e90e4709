use std::fmt::Write;
use std::sync::Arc;

use thiserror::Error;

use crate::llm::LlmServices;
use crate::models::{Evidence, QueryResult, Retrieval, ScoringMethod};
use crate::search::lexical::lexical_search;
use crate::search::vector::vector_search;
use crate::store::DecisionStore;

/// Results kept by vector retrieval and sent to the summarizer.
pub const TOP_K: usize = 5;

#[derive(Debug, Error)]
pub enum AskError {
    #[error("question is required")]
    EmptyQuestion,
    /// The answer step failed; the evidence is still handed back.
    #[error("answer synthesis failed: {message}")]
    Summarization {
        message: String,
        method: ScoringMethod,
        results: Vec<Evidence>,
    },
}

/// Hybrid retrieval over one decision store plus optional answer synthesis.
pub struct QueryEngine {
    store: Arc<DecisionStore>,
    services: LlmServices,
}

impl QueryEngine {
    pub fn new(store: Arc<DecisionStore>, services: LlmServices) -> Self {
        Self { store, services }
    }

    /// Answer a free-text question.
    pub async fn ask(&self, question: &str) -> Result<QueryResult, AskError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::EmptyQuestion);
        }

        let retrieval = self.retrieve(question).await;

        let Some(summarizer) = &self.services.summarizer else {
            return Ok(QueryResult {
                answer: None,
                method: retrieval.method,
                results: retrieval.evidence,
            });
        };

        let prompt = build_prompt(question, &retrieval.evidence);
        match summarizer.summarize(&prompt).await {
            Ok(answer) => Ok(QueryResult {
                answer: Some(answer),
                method: retrieval.method,
                results: retrieval.evidence,
            }),
            Err(e) => {
                tracing::error!("Answer synthesis failed: {e:#}");
                Err(AskError::Summarization {
                    message: format!("{e:#}"),
                    method: retrieval.method,
                    results: retrieval.evidence,
                })
            }
        }
    }

    /// Pick a strategy and rank evidence with it. Never fails: an unusable
    /// vector path falls through to lexical retrieval.
    pub async fn retrieve(&self, question: &str) -> Retrieval {
        let records = self.store.all();
        if records.is_empty() {
            return Retrieval {
                method: ScoringMethod::Lexical,
                evidence: Vec::new(),
            };
        }

        if let Some(query_embedding) = self.embed_question(question).await {
            let evidence = vector_search(&records, &query_embedding, TOP_K);
            tracing::info!("Vector retrieval returned {} decisions", evidence.len());
            return Retrieval {
                method: ScoringMethod::Vector,
                evidence,
            };
        }

        let evidence = lexical_search(&records, question);
        tracing::info!("Lexical retrieval returned {} decisions", evidence.len());
        Retrieval {
            method: ScoringMethod::Lexical,
            evidence,
        }
    }

    /// Embed the question when vector retrieval is possible at all.
    async fn embed_question(&self, question: &str) -> Option<Vec<f32>> {
        let embedder = self.services.embedder.as_ref()?;
        if !self.store.embeddings_present() {
            return None;
        }
        if let Some(space) = self.store.embedding_space() {
            if space.model != embedder.model() {
                tracing::warn!(
                    "Stored embeddings use {} but the service uses {}, using lexical retrieval",
                    space.model,
                    embedder.model()
                );
                return None;
            }
        }

        let texts = [question.to_string()];
        match embedder.embed(&texts).await {
            Ok(mut vectors) if vectors.len() == 1 => vectors.pop(),
            Ok(vectors) => {
                tracing::warn!(
                    "Question embedding returned {} vectors, using lexical retrieval",
                    vectors.len()
                );
                None
            }
            Err(e) => {
                tracing::warn!("Question embedding failed, using lexical retrieval: {e:#}");
                None
            }
        }
    }
}

/// Prompt asking for a brief answer that cites decisions by hash.
pub fn build_prompt(question: &str, evidence: &[Evidence]) -> String {
    let mut prompt = String::from(
        "You answer questions about a project's architecture decisions. \
         Each decision is a commit message (a Y-statement).\n\
         Answer briefly using ONLY the decisions below. Cite decisions as commit `<hash>`. \
         Do not repeat the full decision text.\n\n",
    );

    if evidence.is_empty() {
        prompt.push_str("(No matching decisions were found.)\n");
    } else {
        for e in evidence.iter().take(TOP_K) {
            // Writing to a String cannot fail.
            let _ = writeln!(prompt, "commit {}: {}", e.hash, e.message);
        }
    }

    let _ = write!(prompt, "\nQuestion: {question}");
    prompt
}

#[cfg(test)]
pub(crate) mod fakes {
    use anyhow::Result;
    use futures_util::future::BoxFuture;
    use futures_util::FutureExt;
    use parking_lot::Mutex;

    use crate::llm::Summarizer;

    /// Records prompts and echoes a canned answer.
    pub struct CannedSummarizer {
        pub answer: String,
        pub prompts: Mutex<Vec<String>>,
    }

    impl CannedSummarizer {
        pub fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl Summarizer for CannedSummarizer {
        fn summarize<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>> {
            self.prompts.lock().push(prompt.to_string());
            let answer = self.answer.clone();
            async move { Ok::<_, anyhow::Error>(answer) }.boxed()
        }
    }

    pub struct DownSummarizer;

    impl Summarizer for DownSummarizer {
        fn summarize<'a>(&'a self, _prompt: &'a str) -> BoxFuture<'a, Result<String>> {
            async { Err::<String, _>(anyhow::anyhow!("503 Service Unavailable")) }.boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;
    use crate::llm::indexer::fakes::{DownEmbedder, KeywordEmbedder};
    use crate::llm::indexer::embed_messages;
    use crate::llm::{Embedder, Summarizer};
    use crate::models::CommitRecord;

    const VOCAB: [&str; 3] = ["postgres", "kafka", "redis"];

    fn commits() -> Vec<CommitRecord> {
        [
            ("c3", "In the context of events, we decided for kafka over rabbitmq"),
            ("c2", "In the context of caching, we decided for redis"),
            ("c1", "In the context of storage, we decided for postgres"),
        ]
        .iter()
        .enumerate()
        .map(|(i, (hash, msg))| CommitRecord {
            hash: hash.to_string(),
            parents: vec![],
            message: msg.to_string(),
            sequence: i,
        })
        .collect()
    }

    async fn store_with(embedder: Option<&dyn Embedder>) -> (tempfile::TempDir, Arc<DecisionStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = DecisionStore::open_or_create(dir.path()).unwrap();
        let batch = commits();
        let messages: Vec<String> = batch.iter().map(|c| c.message.clone()).collect();
        let emb = embed_messages(embedder, &messages).await.into_embeddings();
        store.upsert(&batch, emb).unwrap();
        (dir, Arc::new(store))
    }

    fn services(
        embedder: Option<Arc<dyn Embedder>>,
        summarizer: Option<Arc<dyn Summarizer>>,
    ) -> LlmServices {
        LlmServices {
            embedder,
            summarizer,
        }
    }

    #[tokio::test]
    async fn test_lexical_without_embeddings() {
        let (_dir, store) = store_with(None).await;
        let engine = QueryEngine::new(store, LlmServices::default());
        let result = engine.ask("context redis").await.unwrap();
        assert_eq!(result.method, ScoringMethod::Lexical);
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0].hash, "c2");
        assert!(result.answer.is_none());
    }

    #[tokio::test]
    async fn test_vector_when_embeddings_present() {
        let embedder = Arc::new(KeywordEmbedder::new(VOCAB.to_vec()));
        let (_dir, store) = store_with(Some(embedder.as_ref())).await;
        let engine = QueryEngine::new(store, services(Some(embedder.clone()), None));

        let result = engine.ask("why postgres?").await.unwrap();
        assert_eq!(result.method, ScoringMethod::Vector);
        assert_eq!(result.results[0].hash, "c1");
        assert!((result.results[0].score - 1.0).abs() < 1e-6);
        assert!(result.results.len() <= TOP_K);
    }

    #[tokio::test]
    async fn test_embedder_without_stored_vectors_uses_lexical() {
        let (_dir, store) = store_with(None).await;
        let embedder = Arc::new(KeywordEmbedder::new(VOCAB.to_vec()));
        let engine = QueryEngine::new(store, services(Some(embedder.clone()), None));
        let result = engine.ask("decided kafka").await.unwrap();
        assert_eq!(result.method, ScoringMethod::Lexical);
        assert_eq!(result.results[0].hash, "c3");
        assert_eq!(embedder.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_question_embedding_failure_falls_back() {
        let indexing = KeywordEmbedder::new(VOCAB.to_vec());
        let (_dir, store) = store_with(Some(&indexing)).await;
        let engine = QueryEngine::new(store, services(Some(Arc::new(DownEmbedder)), None));
        let result = engine.ask("decided kafka").await.unwrap();
        assert_eq!(result.method, ScoringMethod::Lexical);
        assert_eq!(result.results[0].hash, "c3");
    }

    #[tokio::test]
    async fn test_empty_store_returns_no_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DecisionStore::open_or_create(dir.path()).unwrap());
        let engine = QueryEngine::new(store, LlmServices::default());
        let result = engine.ask("anything at all").await.unwrap();
        assert!(result.results.is_empty());
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let (_dir, store) = store_with(None).await;
        let engine = QueryEngine::new(store, LlmServices::default());
        assert!(matches!(engine.ask("   ").await, Err(AskError::EmptyQuestion)));
    }

    #[tokio::test]
    async fn test_answer_synthesized_with_citations_context() {
        let (_dir, store) = store_with(None).await;
        let summarizer = Arc::new(CannedSummarizer::new("See commit `c2`."));
        let engine = QueryEngine::new(store, services(None, Some(summarizer.clone())));

        let result = engine.ask("caching redis").await.unwrap();
        assert_eq!(result.answer.as_deref(), Some("See commit `c2`."));

        let prompts = summarizer.prompts.lock();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("commit c2: In the context of caching"));
        assert!(prompts[0].contains("Question: caching redis"));
    }

    #[tokio::test]
    async fn test_summarizer_failure_keeps_evidence() {
        let (_dir, store) = store_with(None).await;
        let engine = QueryEngine::new(store, services(None, Some(Arc::new(DownSummarizer))));
        match engine.ask("storage postgres").await {
            Err(AskError::Summarization { results, message, .. }) => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].hash, "c1");
                assert!(message.contains("503"));
            }
            other => panic!("expected summarization error, got {other:?}"),
        }
    }

    #[test]
    fn test_prompt_caps_context() {
        let evidence: Vec<Evidence> = (0..8)
            .map(|i| Evidence {
                hash: format!("h{i}"),
                message: format!("decision {i}"),
                score: 1.0,
            })
            .collect();
        let prompt = build_prompt("what?", &evidence);
        assert!(prompt.contains("commit h4:"));
        assert!(!prompt.contains("commit h5:"));
    }

    #[test]
    fn test_prompt_without_evidence() {
        let prompt = build_prompt("what?", &[]);
        assert!(prompt.contains("No matching decisions"));
    }
}
