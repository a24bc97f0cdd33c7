use std::sync::Arc;

use async_trait::async_trait;
use ollama_rs::{
    generation::chat::{request::ChatMessageRequest, ChatMessage},
    models::ModelOptions,
    Ollama,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::{
    error::{CompletionError, ConfigurationError},
    settings::{Provider, Settings},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message sent to the completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub model: String,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

/// Per-call replacements for [`CompletionOptions`]; `None` keeps the default.
#[derive(Debug, Clone, Default)]
pub struct CompletionOverrides {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    fn merged(&self, overrides: &CompletionOverrides) -> Result<Self, CompletionError> {
        let temperature = overrides.temperature.unwrap_or(self.temperature);
        if !(0.0..=1.0).contains(&temperature) {
            return Err(CompletionError::InvalidOptions(format!(
                "temperature must be within [0, 1], got {temperature}"
            )));
        }
        Ok(Self {
            model: overrides
                .model
                .clone()
                .unwrap_or_else(|| self.model.clone()),
            temperature,
            max_tokens: overrides.max_tokens.unwrap_or(self.max_tokens),
        })
    }
}

/// A text-completion capability. Implementations must not retry.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(
        &self,
        turns: &[Turn],
        options: &CompletionOptions,
    ) -> Result<String, CompletionError>;
}

/// Completion client shared by every pipeline task.
pub struct LlmClient {
    backend: Arc<dyn CompletionBackend>,
    defaults: CompletionOptions,
}

impl LlmClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, defaults: CompletionOptions) -> Self {
        Self { backend, defaults }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigurationError> {
        let backend: Arc<dyn CompletionBackend> = match settings.llm.provider {
            Provider::Ollama => Arc::new(OllamaChat::new(
                &settings.ollama.host,
                settings.ollama.port,
            )?),
            Provider::OpenAi => Arc::new(OpenAiChat::new(
                &settings.openai.base_url,
                settings.openai_api_key()?,
            )),
        };
        let defaults = CompletionOptions {
            model: settings.llm.model.clone(),
            temperature: settings.llm.temperature,
            max_tokens: settings.llm.max_tokens,
        };
        Ok(Self::new(backend, defaults))
    }

    pub async fn generate(
        &self,
        turns: &[Turn],
        overrides: &CompletionOverrides,
    ) -> Result<String, CompletionError> {
        let options = self.defaults.merged(overrides)?;
        debug!(
            "Sending {} turns to model {} (temperature {}, max_tokens {})",
            turns.len(),
            options.model,
            options.temperature,
            options.max_tokens
        );
        self.backend
            .complete(turns, &options)
            .await
            .inspect_err(|e| error!("Completion failed: {e}"))
    }

    /// Wraps a single prompt, plus an optional system instruction, into turns.
    pub async fn simple_query(
        &self,
        prompt: &str,
        system: Option<&str>,
    ) -> Result<String, CompletionError> {
        let mut turns = Vec::with_capacity(2);
        if let Some(system) = system {
            turns.push(Turn::system(system));
        }
        turns.push(Turn::user(prompt));
        self.generate(&turns, &CompletionOverrides::default()).await
    }
}

/// Builds an Ollama client for `host` (scheme and name) on `port`.
pub(crate) fn ollama_client(host: &str, port: u16) -> Result<Ollama, ConfigurationError> {
    let mut url = Url::parse(host)
        .map_err(|e| ConfigurationError::Invalid(format!("ollama.host {host:?}: {e}")))?;
    url.set_port(Some(port))
        .map_err(|()| ConfigurationError::Invalid(format!("ollama.host {host:?} takes no port")))?;
    Ok(Ollama::from_url(url))
}

pub struct OllamaChat {
    client: Ollama,
}

impl OllamaChat {
    pub fn new(host: &str, port: u16) -> Result<Self, ConfigurationError> {
        Ok(Self {
            client: ollama_client(host, port)?,
        })
    }
}

fn to_chat_message(turn: &Turn) -> ChatMessage {
    match turn.role {
        Role::System => ChatMessage::system(turn.content.clone()),
        Role::User => ChatMessage::user(turn.content.clone()),
        Role::Assistant => ChatMessage::assistant(turn.content.clone()),
    }
}

#[async_trait]
impl CompletionBackend for OllamaChat {
    async fn complete(
        &self,
        turns: &[Turn],
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        let messages = turns.iter().map(to_chat_message).collect();
        let model_options = ModelOptions::default()
            .temperature(options.temperature)
            .num_predict(i32::try_from(options.max_tokens).unwrap_or(i32::MAX));
        let request =
            ChatMessageRequest::new(options.model.clone(), messages).options(model_options);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let content = response.message.content;
        if content.is_empty() {
            return Err(CompletionError::NoChoices);
        }
        Ok(content)
    }
}

/// Chat completions against an OpenAI-compatible HTTP API.
pub struct OpenAiChat {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiChat {
    pub fn new(base_url: &str, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionBackend for OpenAiChat {
    async fn complete(
        &self,
        turns: &[Turn],
        options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        let body = ChatRequest {
            model: &options.model,
            messages: turns,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::NoChoices)
    }
}
