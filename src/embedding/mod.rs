//! Embedding backends: a local Ollama runtime or a deterministic offline encoder.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::{Config, EmbeddingProvider};

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// HTTP transport failed.
    #[error("Embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider returned a different number of vectors than inputs.
    #[error("Embedding provider returned {actual} vectors for {expected} inputs")]
    CountMismatch {
        /// Number of inputs sent.
        expected: usize,
        /// Number of vectors received.
        actual: usize,
    },
    /// Returned embedding dimension does not match configuration.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Dimension produced by the provider.
        actual: usize,
    },
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient {
    /// Produce an embedding vector for each supplied text.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Deterministic encoder that hashes bytes into a normalised vector. Needs no model server.
pub struct HashEmbeddingClient {
    dimension: usize,
}

impl HashEmbeddingClient {
    /// Encoder producing vectors of `dimension` entries.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];
        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            embedding[idx % dimension] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }
        embedding
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        Ok(texts
            .iter()
            .map(|text| Self::encode(text, self.dimension))
            .collect())
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Client for Ollama's `POST /api/embed`.
pub struct OllamaEmbeddingClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaEmbeddingClient {
    /// Client for the Ollama runtime at `base_url` using `model`.
    pub fn new(base_url: &str, model: &str) -> Result<Self, EmbeddingClientError> {
        let client = Client::builder()
            .user_agent("lawpipe/0.1")
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let expected = texts.len();
        tracing::debug!(model = %self.model, inputs = expected, "Requesting embeddings");

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }
        let parsed: EmbedResponse = response.json().await?;
        if parsed.embeddings.len() != expected {
            return Err(EmbeddingClientError::CountMismatch {
                expected,
                actual: parsed.embeddings.len(),
            });
        }
        Ok(parsed.embeddings)
    }
}

/// Build the embedding client selected by the configuration.
pub fn build_embedding_client(
    config: &Config,
) -> Result<Box<dyn EmbeddingClient + Send + Sync>, EmbeddingClientError> {
    match config.embedding_provider {
        EmbeddingProvider::Ollama => Ok(Box::new(OllamaEmbeddingClient::new(
            &config.ollama_url,
            &config.embedding_model,
        )?)),
        EmbeddingProvider::Hash => Ok(Box::new(HashEmbeddingClient::new(
            config.embedding_dimension,
        ))),
    }
}

/// Embed `texts` in batches of `batch_size`, rejecting vectors whose length is not `dimension`.
pub async fn embed_all(
    client: &(dyn EmbeddingClient + Send + Sync),
    texts: &[String],
    batch_size: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let produced = client.generate_embeddings(batch.to_vec()).await?;
        if produced.len() != batch.len() {
            return Err(EmbeddingClientError::CountMismatch {
                expected: batch.len(),
                actual: produced.len(),
            });
        }
        if let Some(bad) = produced.iter().find(|vector| vector.len() != dimension) {
            return Err(EmbeddingClientError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }
        vectors.extend(produced);
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn hash_client_is_deterministic_and_normalised() {
        let client = HashEmbeddingClient::new(8);
        let first = client
            .generate_embeddings(vec!["Section 1".into(), "Section 1".into()])
            .await
            .expect("embed");
        assert_eq!(first[0], first[1]);
        let norm: f32 = first[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn ollama_client_posts_batches() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/embed")
                    .json_body(json!({"model": "nomic-embed-text", "input": ["a", "b"]}));
                then.status(200)
                    .json_body(json!({"embeddings": [[0.1, 0.2], [0.3, 0.4]]}));
            })
            .await;

        let client = OllamaEmbeddingClient::new(&server.base_url(), "nomic-embed-text")
            .expect("client");
        let vectors = client
            .generate_embeddings(vec!["a".into(), "b".into()])
            .await
            .expect("embed");
        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[tokio::test]
    async fn ollama_errors_surface_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(404).body("model not found");
            })
            .await;
        let client = OllamaEmbeddingClient::new(&server.base_url(), "missing").expect("client");
        let err = client
            .generate_embeddings(vec!["a".into()])
            .await
            .expect_err("404");
        assert!(err.to_string().contains("model not found"));
    }

    #[tokio::test]
    async fn embed_all_rejects_wrong_dimension() {
        let client = HashEmbeddingClient::new(4);
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let vectors = embed_all(&client, &texts, 2, 4).await.expect("embed");
        assert_eq!(vectors.len(), 3);

        let err = embed_all(&client, &texts, 2, 768).await.expect_err("mismatch");
        assert!(matches!(
            err,
            EmbeddingClientError::DimensionMismatch {
                expected: 768,
                actual: 4
            }
        ));
    }
}
