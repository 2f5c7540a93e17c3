//! Blocking HTTP client for Ollama-style `/api/embeddings` endpoints.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::EmbeddingError;

/// Embeds one prompt per request. No retries; the caller decides what a
/// failed row means.
#[derive(Clone)]
pub struct OllamaEmbedder {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        anyhow::ensure!(!config.url.trim().is_empty(), "missing embedding service URL");
        anyhow::ensure!(!config.model.trim().is_empty(), "missing embedding model name");

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("failed to build embedding HTTP client")?;

        tracing::debug!(endpoint = %config.url, model = %config.model, "embedding client ready");

        Ok(Self {
            client,
            endpoint: config.url.clone(),
            model: config.model.clone(),
        })
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };
        let resp = self.client.post(&self.endpoint).json(&request).send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbeddingError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes()?;
        parse_response(&body)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Option<Vec<f32>>,
}

fn parse_response(body: &[u8]) -> Result<Vec<f32>, EmbeddingError> {
    let parsed: EmbeddingResponse = serde_json::from_slice(body)
        .map_err(|e| EmbeddingError::Format(format!("invalid JSON: {e}")))?;
    match parsed.embedding {
        Some(v) if !v.is_empty() => Ok(v),
        Some(_) => Err(EmbeddingError::Format("empty `embedding` array".into())),
        None => Err(EmbeddingError::Format("missing `embedding` field".into())),
    }
}
