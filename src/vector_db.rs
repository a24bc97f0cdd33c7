use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use qdrant_client::{
    qdrant::{
        CreateCollectionBuilder, DeleteCollectionBuilder, Distance, PointStruct,
        QueryPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
    },
    Payload, Qdrant,
};
use serde_json::json;
use tracing::info;

use crate::{error::IndexError, knowledge::DocumentChunk};

/// A chunk together with its embedding.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub chunk: DocumentChunk,
    pub vector: Vec<f32>,
}

/// Creates populated similarity indexes.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn build(&self, entries: Vec<EmbeddedChunk>) -> Result<Arc<dyn VectorIndex>, IndexError>;
}

/// A read-only k-nearest-neighbour index over chunk embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Returns up to `k` chunks ordered nearest-first.
    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<DocumentChunk>, IndexError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn dimension_of(entries: &[EmbeddedChunk]) -> Result<usize, IndexError> {
    let dimension = entries.first().map_or(0, |entry| entry.vector.len());
    if dimension == 0 {
        return Err(IndexError::Backend("embeddings are empty".to_string()));
    }
    if let Some(entry) = entries.iter().find(|e| e.vector.len() != dimension) {
        return Err(IndexError::Backend(format!(
            "embedding of {} has dimension {}, expected {dimension}",
            entry.chunk.id(),
            entry.vector.len()
        )));
    }
    Ok(dimension)
}

/// Exact cosine-similarity search held in process memory.
#[derive(Debug, Default)]
pub struct MemoryVectorStore;

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn build(&self, entries: Vec<EmbeddedChunk>) -> Result<Arc<dyn VectorIndex>, IndexError> {
        let dimension = dimension_of(&entries)?;
        let entries = entries
            .into_iter()
            .map(|entry| (normalize(entry.vector), entry.chunk))
            .collect();
        Ok(Arc::new(MemoryIndex { dimension, entries }))
    }
}

struct MemoryIndex {
    dimension: usize,
    entries: Vec<(Vec<f32>, DocumentChunk)>,
}

fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
    vector
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<DocumentChunk>, IndexError> {
        if vector.len() != self.dimension {
            return Err(IndexError::Backend(format!(
                "query has dimension {}, expected {}",
                vector.len(),
                self.dimension
            )));
        }
        let query = normalize(vector.to_vec());
        let mut scored: Vec<(f32, &DocumentChunk)> = self
            .entries
            .iter()
            .map(|(v, chunk)| (dot(v, &query), chunk))
            .collect();
        // Stable, so equal scores keep insertion order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, chunk)| chunk.clone())
            .collect())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Qdrant-backed store. Each build fills a fresh `<collection>_<generation>`
/// collection so a running index is never mutated in place.
pub struct QdrantVectorStore {
    client: Arc<Qdrant>,
    collection: String,
    generation: AtomicU64,
}

impl QdrantVectorStore {
    pub fn new(url: &str, collection: &str) -> Result<Self, IndexError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| IndexError::Backend(format!("Failed to build Qdrant client: {e}")))?;
        Ok(Self {
            client: Arc::new(client),
            collection: collection.to_string(),
            generation: AtomicU64::new(0),
        })
    }

    async fn drop_collection(&self, name: &str) -> Result<(), IndexError> {
        if self.client.collection_exists(name).await.map_err(backend)? {
            info!("Dropping collection '{}'", name);
            self.client
                .delete_collection(DeleteCollectionBuilder::new(name))
                .await
                .map_err(backend)?;
        }
        Ok(())
    }
}

fn backend(e: impl std::fmt::Display) -> IndexError {
    IndexError::Backend(e.to_string())
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn build(&self, entries: Vec<EmbeddedChunk>) -> Result<Arc<dyn VectorIndex>, IndexError> {
        let dimension = dimension_of(&entries)?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst);
        let name = format!("{}_{generation}", self.collection);

        self.drop_collection(&name).await?;
        info!("Creating collection '{}'", name);
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name.clone()).vectors_config(VectorParamsBuilder::new(
                    dimension as u64,
                    Distance::Cosine,
                )),
            )
            .await
            .map_err(backend)?;

        let len = entries.len();
        let mut points = Vec::with_capacity(len);
        for (id, entry) in (0u64..).zip(entries) {
            let chunk = entry.chunk;
            let payload = Payload::try_from(json!({
                "page_content": chunk.text,
                "source": chunk.source,
                "index": chunk.index,
                "start": chunk.start,
                "end": chunk.end,
            }))
            .map_err(backend)?;
            points.push(PointStruct::new(id, entry.vector, payload));
        }

        info!("Upserting {} points into collection '{}'", len, name);
        self.client
            .upsert_points(UpsertPointsBuilder::new(name.clone(), points).wait(true))
            .await
            .map_err(backend)?;

        if let Some(stale) = generation.checked_sub(2) {
            self.drop_collection(&format!("{}_{stale}", self.collection))
                .await?;
        }

        Ok(Arc::new(QdrantIndex {
            client: self.client.clone(),
            collection: name,
            len,
        }))
    }
}

struct QdrantIndex {
    client: Arc<Qdrant>,
    collection: String,
    len: usize,
}

fn chunk_from_payload(payload: &HashMap<String, QdrantValue>) -> Option<DocumentChunk> {
    let text = |key: &str| {
        payload
            .get(key)
            .and_then(QdrantValue::as_str)
            .map(ToString::to_string)
    };
    let number = |key: &str| {
        payload
            .get(key)
            .and_then(QdrantValue::as_integer)
            .and_then(|n| usize::try_from(n).ok())
    };
    Some(DocumentChunk {
        source: text("source")?,
        index: number("index")?,
        start: number("start")?,
        end: number("end")?,
        text: text("page_content")?,
    })
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<DocumentChunk>, IndexError> {
        let response = self
            .client
            .query(
                QueryPointsBuilder::new(self.collection.clone())
                    .query(vector.to_vec())
                    .limit(k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(backend)?;

        response
            .result
            .iter()
            .map(|point| {
                chunk_from_payload(&point.payload).ok_or_else(|| {
                    IndexError::Backend(format!(
                        "point in '{}' has an incomplete payload",
                        self.collection
                    ))
                })
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.len
    }
}
