//! In-process vector store with brute-force cosine search

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::retrieval::{Metadata, VectorHit, VectorStore};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredVector {
    vector: Vec<f32>,
    #[serde(default)]
    metadata: Metadata,
}

/// Serializable copy of every collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorSnapshot {
    collections: BTreeMap<String, BTreeMap<String, StoredVector>>,
}

/// Vector store holding every collection in memory
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, HashMap<String, StoredVector>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vectors in `collection` (0 when it does not exist)
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, HashMap::len)
    }

    pub async fn snapshot(&self) -> VectorSnapshot {
        let collections = self.collections.read().await;
        VectorSnapshot {
            collections: collections
                .iter()
                .map(|(name, entries)| {
                    let entries = entries.iter().map(|(id, v)| (id.clone(), v.clone())).collect();
                    (name.clone(), entries)
                })
                .collect(),
        }
    }

    pub fn from_snapshot(snapshot: VectorSnapshot) -> Self {
        let collections = snapshot
            .collections
            .into_iter()
            .map(|(name, entries)| (name, entries.into_iter().collect()))
            .collect();
        Self {
            collections: RwLock::new(collections),
        }
    }

    /// Load a store saved with [`InMemoryVectorStore::save`], or an empty one if the file is missing
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                let snapshot: VectorSnapshot = serde_json::from_str(&contents)?;
                debug!(path = %path.display(), "Vector snapshot loaded");
                Ok(Self::from_snapshot(snapshot))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(Error::VectorStoreError(format!(
                "failed to read vector snapshot {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot().await;
        let contents = serde_json::to_string(&snapshot)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(path, contents).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, collection: &str, id: &str, vector: &[f32], metadata: Metadata) -> Result<()> {
        if vector.is_empty() {
            return Err(Error::VectorStoreError("cannot store an empty vector".into()));
        }

        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(
                id.to_string(),
                StoredVector {
                    vector: vector.to_vec(),
                    metadata,
                },
            );
        Ok(())
    }

    async fn search(&self, collection: &str, query_vector: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
        let collections = self.collections.read().await;
        let Some(entries) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<VectorHit> = entries
            .iter()
            .map(|(id, stored)| VectorHit {
                id: id.clone(),
                score: cosine_similarity(query_vector, &stored.vector),
                metadata: stored.metadata.clone(),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        if let Some(entries) = self.collections.write().await.get_mut(collection) {
            entries.remove(id);
        }
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        self.collections.write().await.remove(collection);
        Ok(())
    }
}

/// Cosine similarity, 0 for mismatched lengths or zero vectors
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}
