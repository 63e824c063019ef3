//! In-process property graph with token-seeded traversal

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::retrieval::{GraphHit, GraphQuery, GraphStore, Metadata, tokenize};
use crate::error::{Error, Result};

/// Score multiplier applied per edge walked away from a seed node
pub const HOP_DECAY: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Edge {
    from: String,
    to: String,
    relation: String,
    #[serde(default)]
    properties: Metadata,
}

/// Serializable copy of the whole graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    nodes: BTreeMap<String, BTreeMap<String, Metadata>>,
    edges: Vec<Edge>,
}

/// Graph store keeping nodes per collection and one global edge list
///
/// `query` seeds on nodes whose `content` property shares lowercased tokens
/// with the query text (score = fraction of query tokens matched), then walks
/// edges in both directions up to `max_hops`, multiplying the score by
/// [`HOP_DECAY`] per hop. Only nodes of the queried collection are returned.
///
/// Edge endpoints that are not a node in any collection (such as the document
/// id the indexer links chunks from) are walked through but never returned,
/// so sibling chunks of a document sit two hops apart.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    inner: RwLock<GraphSnapshot>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn node_count(&self, collection: &str) -> usize {
        self.inner
            .read()
            .await
            .nodes
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    pub async fn edge_count(&self) -> usize {
        self.inner.read().await.edges.len()
    }

    pub async fn snapshot(&self) -> GraphSnapshot {
        self.inner.read().await.clone()
    }

    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        Self {
            inner: RwLock::new(snapshot),
        }
    }

    /// Load a graph saved with [`InMemoryGraphStore::save`], or an empty one if the file is missing
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                let snapshot: GraphSnapshot = serde_json::from_str(&contents)?;
                debug!(path = %path.display(), "Graph snapshot loaded");
                Ok(Self::from_snapshot(snapshot))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(Error::GraphStoreError(format!(
                "failed to read graph snapshot {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string(&*self.inner.read().await)?;
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(path, contents).await?;
        Ok(())
    }
}

fn lowercase_tokens(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().map(|t| t.to_ascii_lowercase()).collect()
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn create_node(&self, collection: &str, id: &str, properties: Metadata) -> Result<()> {
        self.inner
            .write()
            .await
            .nodes
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), properties);
        Ok(())
    }

    async fn create_edge(&self, from_id: &str, to_id: &str, relation: &str, properties: Metadata) -> Result<()> {
        if relation.is_empty() {
            return Err(Error::GraphStoreError("edge relation cannot be empty".into()));
        }

        let mut graph = self.inner.write().await;
        let duplicate = graph
            .edges
            .iter()
            .any(|e| e.from == from_id && e.to == to_id && e.relation == relation);
        if !duplicate {
            graph.edges.push(Edge {
                from: from_id.to_string(),
                to: to_id.to_string(),
                relation: relation.to_string(),
                properties,
            });
        }
        Ok(())
    }

    async fn query(&self, collection: &str, query: &GraphQuery) -> Result<Vec<GraphHit>> {
        let query_tokens = lowercase_tokens(&query.text);
        if query_tokens.is_empty() || query.limit == 0 {
            return Ok(Vec::new());
        }

        let graph = self.inner.read().await;
        let Some(nodes) = graph.nodes.get(collection) else {
            return Ok(Vec::new());
        };

        // node id -> (score, hops)
        let mut reached: HashMap<&str, (f32, u32)> = HashMap::new();
        let mut frontier: VecDeque<&str> = VecDeque::new();

        for (id, properties) in nodes {
            let Some(content) = properties.get("content").and_then(|v| v.as_str()) else {
                continue;
            };
            let matched = lowercase_tokens(content).intersection(&query_tokens).count();
            if matched > 0 {
                reached.insert(id.as_str(), (matched as f32 / query_tokens.len() as f32, 0));
                frontier.push_back(id.as_str());
            }
        }

        if query.max_hops > 0 && !frontier.is_empty() {
            let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
            for edge in &graph.edges {
                adjacency.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
                adjacency.entry(edge.to.as_str()).or_default().push(edge.from.as_str());
            }

            while let Some(id) = frontier.pop_front() {
                let (score, hops) = reached[id];
                if hops >= query.max_hops {
                    continue;
                }
                for &neighbour in adjacency.get(id).into_iter().flatten() {
                    let foreign = !nodes.contains_key(neighbour)
                        && graph
                            .nodes
                            .iter()
                            .any(|(name, other)| name != collection && other.contains_key(neighbour));
                    if foreign {
                        continue;
                    }
                    let candidate = score * HOP_DECAY;
                    match reached.get(neighbour) {
                        Some(&(existing, _)) if existing >= candidate => {}
                        _ => {
                            reached.insert(neighbour, (candidate, hops + 1));
                            frontier.push_back(neighbour);
                        }
                    }
                }
            }
        }

        let mut hits: Vec<GraphHit> = reached
            .into_iter()
            .filter_map(|(id, (score, hops))| {
                nodes.get(id).map(|properties| GraphHit {
                    id: id.to_string(),
                    score,
                    properties: properties.clone(),
                    hops,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        hits.truncate(query.limit);

        debug!(collection, hits = hits.len(), "Graph query completed");
        Ok(hits)
    }

    async fn delete_node(&self, id: &str) -> Result<()> {
        let mut graph = self.inner.write().await;
        for nodes in graph.nodes.values_mut() {
            nodes.remove(id);
        }
        graph.nodes.retain(|_, nodes| !nodes.is_empty());
        graph.edges.retain(|e| e.from != id && e.to != id);
        Ok(())
    }
}
