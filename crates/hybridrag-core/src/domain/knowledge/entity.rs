//! Knowledge aggregate and the documents and embeddings it owns
//!
//! A [`Knowledge`] base is the unit of isolation for indexing and retrieval.
//! Documents are created only through [`Knowledge::add_document`], and an
//! embedding can only be attached to a document the aggregate already holds.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::retrieval::Metadata;
use crate::error::{Error, Result};

/// A named, versioned collection of documents and their embeddings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Knowledge {
    id: String,
    name: String,
    description: String,
    documents: Vec<Document>,
    /// Keyed by document id, at most one embedding per document
    embeddings: BTreeMap<String, Embedding>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Knowledge {
    /// Create a new knowledge base at version 1
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("knowledge name cannot be empty".into()));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            description: description.into(),
            documents: Vec::new(),
            embeddings: BTreeMap::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Documents in insertion order
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document(&self, document_id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == document_id)
    }

    pub fn embeddings(&self) -> &BTreeMap<String, Embedding> {
        &self.embeddings
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Append a document and return a copy of it
    pub fn add_document(&mut self, content: impl Into<String>, metadata: Metadata) -> Result<Document> {
        let document = Document::new(content, metadata)?;
        self.documents.push(document.clone());
        self.touch();
        Ok(document)
    }

    /// Attach an embedding to an existing document, replacing any previous one
    pub fn add_embedding(&mut self, document_id: &str, vector: Vec<f32>, model: impl Into<String>) -> Result<()> {
        if self.document(document_id).is_none() {
            return Err(Error::DocumentNotFound(document_id.to_string()));
        }

        let embedding = Embedding::new(document_id, vector, model)?;
        self.embeddings.insert(document_id.to_string(), embedding);
        self.touch();
        Ok(())
    }

    pub fn get_embedding(&self, document_id: &str) -> Result<&Embedding> {
        self.embeddings
            .get(document_id)
            .ok_or_else(|| Error::EmbeddingNotFound(document_id.to_string()))
    }

    /// Documents that have no embedding yet, in insertion order
    pub fn pending_documents(&self) -> impl Iterator<Item = &Document> {
        self.documents
            .iter()
            .filter(|d| !self.embeddings.contains_key(&d.id))
    }

    pub fn increment_version(&mut self) {
        self.version += 1;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A document owned by a knowledge base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl Document {
    fn new(content: impl Into<String>, metadata: Metadata) -> Result<Self> {
        let content = content.into();
        if content.is_empty() {
            return Err(Error::InvalidInput("document content cannot be empty".into()));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            content,
            metadata,
            created_at: Utc::now(),
        })
    }
}

/// Vector representation of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub document_id: String,
    pub vector: Vec<f32>,
    pub dimension: usize,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

impl Embedding {
    fn new(document_id: &str, vector: Vec<f32>, model: impl Into<String>) -> Result<Self> {
        if vector.is_empty() {
            return Err(Error::InvalidInput("embedding vector cannot be empty".into()));
        }

        Ok(Self {
            document_id: document_id.to_string(),
            dimension: vector.len(),
            vector,
            model: model.into(),
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_knowledge() {
        let knowledge = Knowledge::new("docs", "project docs").unwrap();
        assert_eq!(knowledge.name(), "docs");
        assert_eq!(knowledge.description(), "project docs");
        assert_eq!(knowledge.version(), 1);
        assert!(knowledge.documents().is_empty());
        assert!(Uuid::parse_str(knowledge.id()).is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(Knowledge::new("", "d"), Err(Error::InvalidInput(_))));
        assert!(matches!(Knowledge::new("   ", "d"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_add_document() {
        let mut knowledge = Knowledge::new("docs", "").unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("lang".into(), json!("en"));

        let doc = knowledge.add_document("hello world", metadata).unwrap();
        assert_eq!(knowledge.documents().len(), 1);
        assert_eq!(knowledge.document(&doc.id).unwrap().metadata["lang"], json!("en"));
        assert!(knowledge.add_document("", Metadata::new()).is_err());
        assert_eq!(knowledge.documents().len(), 1);
    }

    #[test]
    fn test_add_embedding_requires_document() {
        let mut knowledge = Knowledge::new("docs", "").unwrap();
        let err = knowledge.add_embedding("missing", vec![0.1], "m").unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound(_)));

        let doc = knowledge.add_document("text", Metadata::new()).unwrap();
        assert!(matches!(
            knowledge.add_embedding(&doc.id, Vec::new(), "m"),
            Err(Error::InvalidInput(_))
        ));

        knowledge.add_embedding(&doc.id, vec![0.1, 0.2], "m").unwrap();
        let embedding = knowledge.get_embedding(&doc.id).unwrap();
        assert_eq!(embedding.dimension, 2);
        assert_eq!(embedding.model, "m");
    }

    #[test]
    fn test_embedding_last_write_wins() {
        let mut knowledge = Knowledge::new("docs", "").unwrap();
        let doc = knowledge.add_document("text", Metadata::new()).unwrap();
        knowledge.add_embedding(&doc.id, vec![0.1, 0.2], "a").unwrap();
        knowledge.add_embedding(&doc.id, vec![0.3, 0.4, 0.5], "b").unwrap();

        assert_eq!(knowledge.embeddings().len(), 1);
        let embedding = knowledge.get_embedding(&doc.id).unwrap();
        assert_eq!(embedding.model, "b");
        assert_eq!(embedding.dimension, 3);
    }

    #[test]
    fn test_pending_documents() {
        let mut knowledge = Knowledge::new("docs", "").unwrap();
        let first = knowledge.add_document("one", Metadata::new()).unwrap();
        let second = knowledge.add_document("two", Metadata::new()).unwrap();
        knowledge.add_embedding(&first.id, vec![1.0], "m").unwrap();

        let pending: Vec<&str> = knowledge.pending_documents().map(|d| d.id.as_str()).collect();
        assert_eq!(pending, vec![second.id.as_str()]);
    }

    #[test]
    fn test_increment_version() {
        let mut knowledge = Knowledge::new("docs", "").unwrap();
        let before = knowledge.updated_at();
        knowledge.increment_version();
        knowledge.increment_version();
        assert_eq!(knowledge.version(), 3);
        assert!(knowledge.updated_at() >= before);
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut knowledge = Knowledge::new("docs", "d").unwrap();
        let doc = knowledge.add_document("hello", Metadata::new()).unwrap();
        knowledge.add_embedding(&doc.id, vec![0.5], "m").unwrap();

        let json = serde_json::to_string(&knowledge).unwrap();
        let parsed: Knowledge = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, knowledge);
    }
}
