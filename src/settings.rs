// src/settings.rs

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use clap::Parser;
use config::{builder::DefaultState, ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

const DEFAULT_ADDR: &str = "127.0.0.1:8000";
const ENV_PREFIX: &str = "LOAN_ASSISTANT";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";

#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// Path to the local configuration TOML file.
    #[arg(short, value_name = "CONFIG_PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Web {
    #[serde(deserialize_with = "deserialize_socket_addr")]
    pub address: SocketAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Ollama,
    OpenAi,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LlmSettings {
    pub provider: Provider,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub provider: Provider,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OllamaSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenAiSettings {
    pub base_url: String,
    /// Read from `OPENAI_API_KEY`, never from the file.
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KnowledgeSettings {
    pub docs_path: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Memory,
    Qdrant,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexSettings {
    pub backend: IndexBackend,
    pub qdrant_url: String,
    pub collection: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogSettings {
    pub format: LogFormat,
    pub level: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    pub web: Web,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub ollama: OllamaSettings,
    pub openai: OpenAiSettings,
    pub knowledge: KnowledgeSettings,
    pub index: IndexSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Loads settings from defaults, the optional TOML file, and
    /// `LOAN_ASSISTANT__*` environment variables, in that order.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let env = Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true);
        let mut settings = Self::from_sources(path, Some(env))?;
        settings.openai.api_key = std::env::var(OPENAI_API_KEY).ok();
        Ok(settings)
    }

    pub(crate) fn from_sources(
        path: Option<&Path>,
        env: Option<Environment>,
    ) -> Result<Self, ConfigurationError> {
        let mut builder = Self::defaults()?;
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        if let Some(env) = env {
            builder = builder.add_source(env);
        }

        let settings: Self = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigurationError> {
        Ok(ConfigBuilder::<DefaultState>::default()
            .set_default("web.address", DEFAULT_ADDR)?
            .set_default("llm.provider", "ollama")?
            .set_default("llm.model", "llama3.1:8b")?
            .set_default("llm.temperature", 0.2_f64)?
            .set_default("llm.max_tokens", 500_i64)?
            .set_default("embedding.provider", "ollama")?
            .set_default("embedding.model", "nomic-embed-text")?
            .set_default("ollama.host", "http://127.0.0.1")?
            .set_default("ollama.port", 11434_i64)?
            .set_default("openai.base_url", "https://api.openai.com/v1")?
            .set_default("knowledge.docs_path", "./docs")?
            .set_default("knowledge.chunk_size", 500_i64)?
            .set_default("knowledge.chunk_overlap", 100_i64)?
            .set_default("knowledge.top_k", 4_i64)?
            .set_default("index.backend", "memory")?
            .set_default("index.qdrant_url", "http://localhost:6334")?
            .set_default("index.collection", "loan_policies")?
            .set_default("log.format", "json")?
            .set_default("log.level", "info")?)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if !(0.0..=1.0).contains(&self.llm.temperature) {
            return Err(ConfigurationError::Invalid(format!(
                "llm.temperature must be within [0, 1], got {}",
                self.llm.temperature
            )));
        }
        if self.knowledge.chunk_size == 0 {
            return Err(ConfigurationError::Invalid(
                "knowledge.chunk_size must be positive".to_string(),
            ));
        }
        if self.knowledge.chunk_overlap >= self.knowledge.chunk_size {
            return Err(ConfigurationError::Invalid(format!(
                "knowledge.chunk_overlap ({}) must be smaller than knowledge.chunk_size ({})",
                self.knowledge.chunk_overlap, self.knowledge.chunk_size
            )));
        }
        if self.knowledge.top_k == 0 {
            return Err(ConfigurationError::Invalid(
                "knowledge.top_k must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The OpenAI key; a missing or blank key is fatal for OpenAI backends.
    pub fn openai_api_key(&self) -> Result<String, ConfigurationError> {
        self.openai
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigurationError::Missing(OPENAI_API_KEY))
    }
}

fn deserialize_socket_addr<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}
