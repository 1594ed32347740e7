//! Embedding client for OpenAI-compatible `/embeddings` endpoints.
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Embedder, EmbedderError};
use crate::config::{Config, EmbeddingConfig};
use crate::error::RagError;

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    /// Asks the model to shorten its output to the index dimension.
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Blocking HTTP embedder. Must not be called from inside an async runtime
/// thread; use `spawn_blocking` there.
pub struct OpenAiEmbedder {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    dimensions: usize,
    batch_size: usize,
}

impl OpenAiEmbedder {
    pub fn new(
        api_base: &str,
        api_key: &str,
        model: &str,
        dimensions: usize,
        batch_size: usize,
        timeout: Duration,
    ) -> Result<Self, EmbedderError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("docrag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EmbedderError::Request(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimensions,
            batch_size: batch_size.max(1),
        })
    }

    /// Build from config, reading the API key from the configured env var.
    pub fn from_config(cfg: &EmbeddingConfig) -> Result<Self, RagError> {
        let api_key = Config::api_key(&cfg.api_key_env)?;
        Ok(Self::new(
            &cfg.api_base,
            &api_key,
            &cfg.model,
            cfg.dimensions,
            cfg.batch_size,
            Duration::from_secs(cfg.timeout_secs),
        )?)
    }

    fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let url = format!("{}/embeddings", self.api_base);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingsRequest {
                model: &self.model,
                input: texts,
                dimensions: Some(self.dimensions),
            })
            .send()
            .map_err(|e| EmbedderError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(EmbedderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: EmbeddingsResponse = resp
            .json()
            .map_err(|e| EmbedderError::InvalidResponse(e.to_string()))?;
        order_embeddings(body, texts.len(), self.dimensions)
    }
}

/// Restores input order from the `index` field and checks shape.
fn order_embeddings(
    body: EmbeddingsResponse,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, EmbedderError> {
    if body.data.len() != expected {
        return Err(EmbedderError::InvalidResponse(format!(
            "asked for {expected} embeddings, got {}",
            body.data.len()
        )));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in body.data {
        if item.embedding.len() != dimensions {
            return Err(EmbedderError::DimensionMismatch {
                expected: dimensions,
                actual: item.embedding.len(),
            });
        }
        match slots.get_mut(item.index) {
            Some(slot) if slot.is_none() => *slot = Some(item.embedding),
            _ => {
                return Err(EmbedderError::InvalidResponse(format!(
                    "unexpected or repeated index {}",
                    item.index
                )));
            }
        }
    }

    // Every slot is filled: counts match and indices are unique and in range.
    Ok(slots.into_iter().flatten().collect())
}

impl Embedder for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
        self.request(&[text])?
            .pop()
            .ok_or_else(|| EmbedderError::InvalidResponse("empty embedding list".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!("Requesting {} embeddings from {}", batch.len(), self.model);
            vectors.extend(self.request(batch)?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> EmbeddingsResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_request_carries_dimensions() {
        let request = EmbeddingsRequest {
            model: "text-embedding-3-small",
            input: &["hello"],
            dimensions: Some(256),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["dimensions"], 256);
        assert_eq!(value["input"][0], "hello");

        let request = EmbeddingsRequest {
            model: "m",
            input: &[],
            dimensions: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("dimensions").is_none());
    }

    #[test]
    fn test_order_embeddings_by_index() {
        let body = parse(
            r#"{"object": "list", "data": [
                {"object": "embedding", "index": 1, "embedding": [0.0, 1.0]},
                {"object": "embedding", "index": 0, "embedding": [1.0, 0.0]}
            ], "model": "m"}"#,
        );
        let vectors = order_embeddings(body, 2, 2).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_order_embeddings_wrong_dimension() {
        let body = parse(r#"{"data": [{"index": 0, "embedding": [1.0, 0.0, 0.0]}]}"#);
        let err = order_embeddings(body, 1, 2).unwrap_err();
        assert!(matches!(
            err,
            EmbedderError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_order_embeddings_repeated_index() {
        let body = parse(
            r#"{"data": [
                {"index": 0, "embedding": [1.0]},
                {"index": 0, "embedding": [2.0]}
            ]}"#,
        );
        assert!(matches!(
            order_embeddings(body, 2, 1),
            Err(EmbedderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_order_embeddings_count_mismatch() {
        let body = parse(r#"{"data": [{"index": 0, "embedding": [1.0]}]}"#);
        assert!(matches!(
            order_embeddings(body, 3, 1),
            Err(EmbedderError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_unreachable_service_is_request_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let embedder = OpenAiEmbedder::new(
            "http://127.0.0.1:9/v1",
            "sk-test",
            "text-embedding-3-small",
            4,
            8,
            Duration::from_secs(2),
        )
        .unwrap();
        assert!(matches!(
            embedder.embed("hello"),
            Err(EmbedderError::Request(_))
        ));
    }
}
