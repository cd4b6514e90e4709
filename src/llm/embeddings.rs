use anyhow::{Context, Result};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Deserialize;
use serde_json::json;

use crate::config::LlmConfig;
use crate::llm::Embedder;

/// Maximum characters sent per decision message.
/// Y-statements are short; anything past this is almost certainly a pasted
/// document and only dilutes the vector.
const MAX_EMBED_CHARS: usize = 3_000;

/// Truncate `text` to at most `MAX_EMBED_CHARS` bytes on a char boundary.
fn truncate_for_embedding(text: &str) -> &str {
    if text.len() <= MAX_EMBED_CHARS {
        return text;
    }
    let mut end = MAX_EMBED_CHARS;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Wire dialect of the embedding endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    /// `POST /api/embed` -> `{embeddings: [[..]]}`
    Ollama,
    /// `POST /v1/embeddings` -> `{data: [{embedding: [..]}]}`
    OpenAi,
}

impl Dialect {
    fn for_provider(provider: &str) -> Result<Self> {
        match provider {
            "ollama" => Ok(Dialect::Ollama),
            "openai" => Ok(Dialect::OpenAi),
            other => anyhow::bail!("Unknown LLM provider: {other}"),
        }
    }

    fn endpoint(self, base_url: &str) -> String {
        match self {
            Dialect::Ollama => format!("{base_url}/api/embed"),
            Dialect::OpenAi => format!("{base_url}/v1/embeddings"),
        }
    }

    fn batch_size(self) -> usize {
        match self {
            Dialect::Ollama => 32,
            Dialect::OpenAi => 64,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EmbedResponse {
    Ollama { embeddings: Vec<Vec<f32>> },
    OpenAi { data: Vec<OpenAiEmbedding> },
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
}

impl EmbedResponse {
    fn into_vectors(self) -> Vec<Vec<f32>> {
        match self {
            EmbedResponse::Ollama { embeddings } => embeddings,
            EmbedResponse::OpenAi { data } => data.into_iter().map(|d| d.embedding).collect(),
        }
    }
}

/// Embedding service backed by Ollama or an OpenAI-compatible API.
pub struct EmbeddingClient {
    client: reqwest::Client,
    config: LlmConfig,
    model: String,
}

impl EmbeddingClient {
    pub fn new(client: reqwest::Client, config: LlmConfig, model: String) -> Self {
        Self {
            client,
            config,
            model,
        }
    }
}

impl Embedder for EmbeddingClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
        embed_batch(&self.client, &self.config, &self.model, texts).boxed()
    }
}

/// Embed `texts` in provider-sized chunks, returning vectors in input order.
pub async fn embed_batch(
    client: &reqwest::Client,
    config: &LlmConfig,
    model: &str,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let dialect = Dialect::for_provider(&config.provider)?;
    let url = dialect.endpoint(&config.base_url);

    let mut vectors = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(dialect.batch_size()) {
        let input: Vec<&str> = chunk.iter().map(|t| truncate_for_embedding(t)).collect();
        let body = match dialect {
            Dialect::Ollama => json!({ "model": model, "input": input, "truncate": true }),
            Dialect::OpenAi => json!({ "model": model, "input": input }),
        };

        let mut request = client.post(&url).json(&body);
        if let Some(key) = config.api_key.as_deref() {
            request = request.bearer_auth(key);
        }
        let resp = request
            .send()
            .await
            .with_context(|| format!("Failed to call {} embed API", config.provider))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} embed API returned {status}: {text}", config.provider);
        }

        let parsed: EmbedResponse = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse {} embed response", config.provider))?;
        vectors.extend(parsed.into_vectors());
    }

    tracing::debug!("Embedded {} texts with {model}", vectors.len());
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_for_embedding("we decided for kafka"), "we decided for kafka");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let text = "é".repeat(MAX_EMBED_CHARS);
        let truncated = truncate_for_embedding(&text);
        assert!(truncated.len() <= MAX_EMBED_CHARS);
        assert!(text.is_char_boundary(truncated.len()));
    }

    #[test]
    fn test_response_shapes() {
        let ollama: EmbedResponse =
            serde_json::from_str(r#"{"model":"m","embeddings":[[1.0,2.0]]}"#).unwrap();
        assert_eq!(ollama.into_vectors(), vec![vec![1.0, 2.0]]);

        let openai: EmbedResponse = serde_json::from_str(
            r#"{"object":"list","data":[{"index":0,"embedding":[0.5]},{"index":1,"embedding":[0.25]}]}"#,
        )
        .unwrap();
        assert_eq!(openai.into_vectors(), vec![vec![0.5], vec![0.25]]);
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(
            Dialect::Ollama.endpoint("http://localhost:11434"),
            "http://localhost:11434/api/embed"
        );
        assert_eq!(
            Dialect::OpenAi.endpoint("https://api.example.com"),
            "https://api.example.com/v1/embeddings"
        );
    }

    #[tokio::test]
    async fn test_empty_batch_skips_network() {
        let client = reqwest::Client::new();
        let config = LlmConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..LlmConfig::default()
        };
        let result = embed_batch(&client, &config, "m", &[]).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_provider_is_an_error() {
        let client = reqwest::Client::new();
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..LlmConfig::default()
        };
        let result = embed_batch(&client, &config, "m", &["x".to_string()]).await;
        assert!(result.is_err());
    }
}
