//! External language-model services: embeddings and answer synthesis.
//!
//! Both are optional. Missing configuration degrades the query path to
//! lexical retrieval without a synthesized answer.

pub mod embeddings;
pub mod indexer;
pub mod summarize;

use anyhow::Result;
use futures_util::future::BoxFuture;
use std::sync::Arc;

use crate::config::LlmConfig;

/// Turns texts into fixed-dimension vectors, one per input, in input order.
pub trait Embedder: Send + Sync {
    /// Model identifier, recorded with stored vectors.
    fn model(&self) -> &str;

    fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

/// Produces a short natural-language answer from a prompt.
pub trait Summarizer: Send + Sync {
    fn summarize<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String>>;
}

/// The LLM capabilities available to this process.
#[derive(Clone, Default)]
pub struct LlmServices {
    pub embedder: Option<Arc<dyn Embedder>>,
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

impl LlmServices {
    /// Build whichever services the configuration enables.
    pub fn from_config(client: &reqwest::Client, config: Option<&LlmConfig>) -> Self {
        let Some(config) = config else {
            tracing::info!("No LLM provider configured: lexical retrieval only, no answers");
            return Self::default();
        };

        if config.provider == "openai" && config.api_key.is_none() {
            tracing::warn!("LLM provider is openai but LLM_API_KEY is unset, LLM features disabled");
            return Self::default();
        }

        let embedder = config.embedding_model.clone().map(|model| {
            tracing::info!("Embeddings enabled: {} ({model})", config.provider);
            Arc::new(embeddings::EmbeddingClient::new(client.clone(), config.clone(), model))
                as Arc<dyn Embedder>
        });
        let summarizer = config.chat_model.clone().map(|model| {
            tracing::info!("Answer synthesis enabled: {} ({model})", config.provider);
            Arc::new(summarize::ChatClient::new(client.clone(), config.clone(), model))
                as Arc<dyn Summarizer>
        });

        Self {
            embedder,
            summarizer,
        }
    }
}
