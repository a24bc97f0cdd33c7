pub mod document;
pub mod splitter;

use std::{
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, info};

pub use self::{
    document::{load_documents, DocumentChunk, RawDocument},
    splitter::TextSplitter,
};
use crate::{
    embedder::Embedder,
    error::{EmptyCorpus, IndexError},
    vector_db::{EmbeddedChunk, VectorIndex, VectorStore},
};

const EMBED_BATCH_SIZE: usize = 64;

/// Looks up the chunks most similar to a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<DocumentChunk>, IndexError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Built { documents: usize, chunks: usize },
    Skipped(EmptyCorpus),
}

/// Policy documents loaded from disk, chunked, embedded and indexed.
///
/// The index starts empty. [`KnowledgeIndex::build`] swaps in a complete
/// index in one step; lookups before the first successful build fail fast
/// with [`IndexError::NotReady`] rather than waiting.
pub struct KnowledgeIndex {
    docs_path: PathBuf,
    splitter: TextSplitter,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    current: RwLock<Option<Arc<dyn VectorIndex>>>,
    building: Mutex<()>,
}

impl KnowledgeIndex {
    pub fn new(
        docs_path: impl Into<PathBuf>,
        splitter: TextSplitter,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            docs_path: docs_path.into(),
            splitter,
            embedder,
            store,
            current: RwLock::new(None),
            building: Mutex::new(()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Number of indexed chunks, zero while not built.
    pub fn len(&self) -> usize {
        self.snapshot().map_or(0, |index| index.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Option<Arc<dyn VectorIndex>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Loads, splits, embeds and indexes the corpus.
    ///
    /// An empty corpus is reported as [`BuildOutcome::Skipped`] and leaves
    /// whatever index was being served untouched. Builds are serialized.
    pub async fn build(&self) -> Result<BuildOutcome, IndexError> {
        let _guard = self.building.lock().await;
        info!("Starting vector index build from {}", self.docs_path.display());

        let documents = load_documents(&self.docs_path).await?;
        info!(count = documents.len(), "Raw documents loaded");
        if documents.is_empty() {
            error!("No documents found. Skipping index build.");
            return Ok(BuildOutcome::Skipped(EmptyCorpus::NoDocuments));
        }

        let chunks = self.splitter.split_documents(&documents);
        info!(count = chunks.len(), "Documents split into chunks");
        if chunks.is_empty() {
            error!("No chunks generated. Skipping index build.");
            return Ok(BuildOutcome::Skipped(EmptyCorpus::NoChunks));
        }

        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            entries.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(vectors)
                    .map(|(chunk, vector)| EmbeddedChunk { chunk, vector }),
            );
        }

        let chunk_count = entries.len();
        let index = self.store.build(entries).await?;
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(index);

        info!("Vector index successfully built");
        Ok(BuildOutcome::Built {
            documents: documents.len(),
            chunks: chunk_count,
        })
    }
}

#[async_trait]
impl Retriever for KnowledgeIndex {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<DocumentChunk>, IndexError> {
        let index = self.snapshot().ok_or(IndexError::NotReady)?;
        let vector = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| IndexError::Embedding("no embedding for query".to_string()))?;
        index.nearest(&vector, k).await
    }
}
