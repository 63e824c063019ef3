//! On-disk state shared by every command
//!
//! ```text
//! <data_dir>/
//! ├── knowledge/     one JSON record per knowledge base
//! ├── vectors.json   vector store snapshot
//! └── graph.json     graph store snapshot
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use hybridrag_core::config::Config;
use hybridrag_core::domain::knowledge::{Knowledge, KnowledgeStore};
use hybridrag_core::domain::retrieval::{
    Chunker, Embedder, HybridRetriever, Indexer, KnowledgeGraphRetriever, KnowledgeVectorRetriever, LexicalReranker,
    ReciprocalRankFusion, SemanticSearch,
};
use hybridrag_core::infrastructure::{
    FileKnowledgeRepository, HashingEmbedder, InMemoryGraphStore, InMemoryVectorStore, OpenAiEmbedder,
};
use tracing::debug;

pub struct Workspace {
    pub config: Config,
    pub store: KnowledgeStore,
    indexer: Arc<Indexer>,
    vectors: Arc<InMemoryVectorStore>,
    graph: Arc<InMemoryGraphStore>,
    embedder: Option<Arc<dyn Embedder>>,
    data_dir: PathBuf,
}

impl Workspace {
    /// Load state from the data directory
    ///
    /// The embedder is only built when `needs_embedder` is set, so commands
    /// that never embed work without provider credentials.
    pub async fn open(config: Config, needs_embedder: bool) -> anyhow::Result<Self> {
        let data_dir = config.data_dir()?;
        let settings = config.indexing.resolve()?;

        let vectors = Arc::new(InMemoryVectorStore::load(&data_dir.join("vectors.json")).await?);
        let graph = Arc::new(InMemoryGraphStore::load(&data_dir.join("graph.json")).await?);
        let repository = FileKnowledgeRepository::open(data_dir.join("knowledge"))
            .await
            .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?;

        let embedder = if needs_embedder {
            Some(build_embedder(&config)?)
        } else {
            None
        };

        let mut indexer = Indexer::new(Chunker::from_settings(settings)?)
            .with_vector_store(vectors.clone())
            .with_graph_store(graph.clone())
            .with_default_limit(config.retrieval.resolved_limit());
        if let Some(embedder) = &embedder {
            indexer = indexer.with_embedder(embedder.clone());
        }
        let indexer = Arc::new(indexer);

        let mut store = KnowledgeStore::new(Arc::new(repository), indexer.clone());
        if let Some(embedder) = &embedder {
            store = store.with_embedder(embedder.clone());
        }

        debug!(data_dir = %data_dir.display(), "Workspace opened");

        Ok(Self {
            config,
            store,
            indexer,
            vectors,
            graph,
            embedder,
            data_dir,
        })
    }

    /// Write the index snapshots back to disk
    pub async fn persist(&self) -> anyhow::Result<()> {
        self.vectors
            .save(&self.data_dir.join("vectors.json"))
            .await
            .context("Failed to save vector index")?;
        self.graph
            .save(&self.data_dir.join("graph.json"))
            .await
            .context("Failed to save graph index")?;
        Ok(())
    }

    pub fn embedding_model(&self) -> &str {
        &self.config.embedding.model
    }

    pub fn semantic_search(&self) -> anyhow::Result<SemanticSearch> {
        let embedder = self
            .embedder
            .clone()
            .context("No embedder configured for this command")?;
        Ok(SemanticSearch::new(self.vectors.clone(), embedder))
    }

    /// Hybrid retriever bound to one knowledge base
    pub fn retriever(&self, knowledge: &Knowledge, rerank: bool) -> HybridRetriever {
        let contents: HashMap<String, String> = knowledge
            .documents()
            .iter()
            .map(|d| (d.id.clone(), d.content.clone()))
            .collect();

        let retrieval = &self.config.retrieval;
        let vector = KnowledgeVectorRetriever::new(self.indexer.clone(), knowledge.id()).with_contents(contents);
        let graph = KnowledgeGraphRetriever::new(self.graph.clone(), knowledge.id())
            .with_max_hops(retrieval.graph_max_hops);

        let mut retriever = HybridRetriever::new()
            .with_vector_retriever(Arc::new(vector))
            .with_graph_retriever(Arc::new(graph))
            .with_fusion(ReciprocalRankFusion::with_k(retrieval.rrf_k))
            .with_default_limit(retrieval.resolved_limit());

        if rerank {
            retriever = retriever.with_reranker(if retrieval.rerank_case_sensitive {
                LexicalReranker::new()
            } else {
                LexicalReranker::case_insensitive()
            });
        }
        retriever
    }
}

fn build_embedder(config: &Config) -> anyhow::Result<Arc<dyn Embedder>> {
    match config.embedding.provider.as_str() {
        "openai" => Ok(Arc::new(
            OpenAiEmbedder::from_config(&config.embedding).context("Failed to create embeddings client")?,
        )),
        _ => Ok(Arc::new(HashingEmbedder::new(config.embedding.dimension))),
    }
}
