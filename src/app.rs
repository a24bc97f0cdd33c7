use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::{
    embedder,
    error::IndexError,
    knowledge::{BuildOutcome, KnowledgeIndex, TextSplitter},
    lang_graph::LoanAssistant,
    llm::LlmClient,
    settings::{IndexBackend, Settings},
    vector_db::{MemoryVectorStore, QdrantVectorStore, VectorStore},
};

/// Everything a front end needs to answer questions.
pub struct App {
    pub index: Arc<KnowledgeIndex>,
    pub assistant: LoanAssistant,
}

impl App {
    /// Wires the clients together. Missing credentials fail here, before
    /// anything is served.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let llm = Arc::new(LlmClient::from_settings(settings)?);
        let embedder = embedder::from_settings(settings)?;
        let store: Arc<dyn VectorStore> = match settings.index.backend {
            IndexBackend::Memory => Arc::new(MemoryVectorStore),
            IndexBackend::Qdrant => Arc::new(
                QdrantVectorStore::new(&settings.index.qdrant_url, &settings.index.collection)
                    .context("Problem while connecting to Qdrant")?,
            ),
        };

        let index = Arc::new(KnowledgeIndex::new(
            settings.knowledge.docs_path.clone(),
            TextSplitter::new(
                settings.knowledge.chunk_size,
                settings.knowledge.chunk_overlap,
            ),
            embedder,
            store,
        ));
        let assistant = LoanAssistant::new(llm, index.clone(), settings.knowledge.top_k)?;

        Ok(Self { index, assistant })
    }

    /// Builds the knowledge index. An empty corpus is logged and tolerated;
    /// a previously built index keeps serving, otherwise queries needing
    /// retrieval fail until a later build succeeds.
    pub async fn build_index(&self) -> Result<(), IndexError> {
        match self.index.build().await? {
            BuildOutcome::Built { documents, chunks } => {
                info!(documents, chunks, "Knowledge index ready");
            }
            BuildOutcome::Skipped(reason) if self.index.is_empty() => {
                error!(%reason, "Knowledge index not built");
            }
            BuildOutcome::Skipped(reason) => {
                warn!(%reason, chunks = self.index.len(), "Keeping the previous knowledge index");
            }
        }
        Ok(())
    }
}
