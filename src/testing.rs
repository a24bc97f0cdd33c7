//! Deterministic stand-ins for the external capabilities.

use std::{
    hash::{DefaultHasher, Hash, Hasher},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;

use crate::{
    embedder::Embedder,
    error::{CompletionError, IndexError},
    knowledge::{DocumentChunk, Retriever},
    llm::{CompletionBackend, CompletionOptions, LlmClient, Role, Turn},
};

/// Bag-of-words vectors: each lower-cased token bumps one hashed bucket.
pub(crate) struct HashingEmbedder {
    dimension: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimension: 256 }
    }
}

impl HashingEmbedder {
    fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let bucket = usize::try_from(hasher.finish() % self.dimension as u64).unwrap();
            vector[bucket] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, IndexError> {
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Classify,
    Validate,
    Format,
}

impl Stage {
    fn of(turns: &[Turn]) -> Self {
        if turns.iter().any(|t| t.role == Role::System) {
            Stage::Validate
        } else if turns
            .iter()
            .any(|t| t.content.starts_with("Classify the following"))
        {
            Stage::Classify
        } else {
            Stage::Format
        }
    }
}

/// Answers each pipeline stage with a canned reply and records every call.
pub(crate) struct ScriptedLlm {
    pub intent: String,
    pub validation: String,
    pub fail_at: Option<Stage>,
    pub calls: Mutex<Vec<(Stage, Vec<Turn>)>>,
}

impl ScriptedLlm {
    pub fn new(intent: &str, validation: &str) -> Self {
        Self {
            intent: intent.to_string(),
            validation: validation.to_string(),
            fail_at: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn stages(&self) -> Vec<Stage> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(stage, _)| *stage)
            .collect()
    }

    pub fn turns_for(&self, stage: Stage) -> Vec<Turn> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, turns)| turns.clone())
            .unwrap_or_default()
    }

    pub fn client(self: &Arc<Self>) -> Arc<LlmClient> {
        Arc::new(LlmClient::new(
            self.clone(),
            CompletionOptions {
                model: "scripted".to_string(),
                temperature: 0.2,
                max_tokens: 500,
            },
        ))
    }
}

#[async_trait]
impl CompletionBackend for ScriptedLlm {
    async fn complete(
        &self,
        turns: &[Turn],
        _options: &CompletionOptions,
    ) -> Result<String, CompletionError> {
        let stage = Stage::of(turns);
        self.calls.lock().unwrap().push((stage, turns.to_vec()));
        if self.fail_at == Some(stage) {
            return Err(CompletionError::Transport("connection refused".to_string()));
        }
        Ok(match stage {
            Stage::Classify => self.intent.clone(),
            Stage::Validate => self.validation.clone(),
            Stage::Format => {
                let prompt = &turns[turns.len() - 1].content;
                let answer = prompt.split("Answer:\n").nth(1).unwrap_or_default();
                format!("Thank you for asking. {answer}")
            }
        })
    }
}

/// Returns a fixed list of chunks and counts lookups.
pub(crate) struct StaticRetriever {
    pub chunks: Vec<DocumentChunk>,
    pub calls: AtomicUsize,
}

impl StaticRetriever {
    pub fn new(texts: &[&str]) -> Self {
        let chunks = texts
            .iter()
            .enumerate()
            .map(|(index, text)| DocumentChunk {
                source: "docs/policy.md".to_string(),
                index,
                start: 0,
                end: text.chars().count(),
                text: (*text).to_string(),
            })
            .collect();
        Self {
            chunks,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<DocumentChunk>, IndexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.chunks.iter().take(k).cloned().collect())
    }
}
