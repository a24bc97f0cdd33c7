use std::sync::Arc;

use async_trait::async_trait;
use ollama_rs::{
    generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest},
    Ollama,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigurationError, IndexError},
    llm::ollama_client,
    settings::{Provider, Settings},
};

/// Turns text into fixed-dimension vectors. Output order matches input order.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError>;
}

pub fn from_settings(settings: &Settings) -> Result<Arc<dyn Embedder>, ConfigurationError> {
    Ok(match settings.embedding.provider {
        Provider::Ollama => Arc::new(OllamaEmbedder::new(
            &settings.ollama.host,
            settings.ollama.port,
            &settings.embedding.model,
        )?),
        Provider::OpenAi => Arc::new(OpenAiEmbedder::new(
            &settings.openai.base_url,
            settings.openai_api_key()?,
            &settings.embedding.model,
        )),
    })
}

fn check_count(expected: usize, vectors: Vec<Vec<f32>>) -> Result<Vec<Vec<f32>>, IndexError> {
    if vectors.len() == expected {
        Ok(vectors)
    } else {
        Err(IndexError::Embedding(format!(
            "expected {expected} embeddings, got {}",
            vectors.len()
        )))
    }
}

pub struct OllamaEmbedder {
    client: Ollama,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(host: &str, port: u16, model: &str) -> Result<Self, ConfigurationError> {
        Ok(Self {
            client: ollama_client(host, port)?,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = GenerateEmbeddingsRequest::new(
            self.model.clone(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );
        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| IndexError::Embedding(e.to_string()))?;
        check_count(texts.len(), response.embeddings)
    }
}

pub struct OpenAiEmbedder {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(base_url: &str, api_key: String, model: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| IndexError::Embedding(e.to_string()))?;

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| IndexError::Embedding(e.to_string()))?;
        parsed.data.sort_by_key(|item| item.index);
        check_count(
            texts.len(),
            parsed.data.into_iter().map(|item| item.embedding).collect(),
        )
    }
}
