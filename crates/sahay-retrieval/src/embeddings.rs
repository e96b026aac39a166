//! Embedding providers for the vector store.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for embedding text into fixed-dimension vectors.
///
/// The dimension is fixed at construction and must match the vector store the
/// embeddings are written to; the store rejects mismatched vectors loudly.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider identifier.
    fn id(&self) -> &str;
    /// Model name.
    fn model(&self) -> &str;
    /// Vector dimensions.
    fn dimensions(&self) -> usize;
    /// Embed a single query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
    /// Embed a batch of texts, preserving input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embedding provider speaking the OpenAI-compatible `/embeddings` protocol.
pub struct HttpEmbedding {
    endpoint: String,
    api_key: String,
    model: String,
    dimensions: usize,
    client: reqwest::Client,
}

impl HttpEmbedding {
    pub fn new(endpoint: String, api_key: String, model: String, dimensions: usize) -> Self {
        Self {
            endpoint,
            api_key,
            model,
            dimensions,
            client: reqwest::Client::new(),
        }
    }

    /// Construct from the `EMBEDDING_API_KEY` env var.
    pub fn from_env(endpoint: String, model: String, dimensions: usize) -> Option<Self> {
        let api_key = std::env::var("EMBEDDING_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()?;
        Some(Self::new(endpoint, api_key, model, dimensions))
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedding {
    fn id(&self) -> &str {
        "http"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let batch = self.embed_batch(&[text.to_string()]).await?;
        batch
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding result"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
            "dimensions": self.dimensions,
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let json: serde_json::Value = resp.json().await?;

        if !status.is_success() {
            let msg = json
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("Unknown error");
            return Err(anyhow::anyhow!("Embedding error: {msg}"));
        }

        let data = json
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid embedding response format"))?;

        let mut embeddings = Vec::with_capacity(texts.len());
        for item in data {
            let embedding: Vec<f32> = item
                .get("embedding")
                .and_then(|e| e.as_array())
                .ok_or_else(|| anyhow::anyhow!("Missing embedding array"))?
                .iter()
                .filter_map(|v| v.as_f64().map(|f| f as f32))
                .collect();
            if embedding.len() != self.dimensions {
                return Err(anyhow::anyhow!(
                    "Provider returned {} dimensions, expected {}",
                    embedding.len(),
                    self.dimensions
                ));
            }
            embeddings.push(embedding);
        }

        Ok(embeddings)
    }
}
