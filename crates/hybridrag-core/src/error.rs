//! Error types for Hybridrag

use thiserror::Error;

/// Result type alias using Hybridrag's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Hybridrag error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Entity errors (E001-E099)
    #[error("Knowledge base '{0}' not found. Run `hybridrag kb list` to see all knowledge bases.")]
    KnowledgeNotFound(String),

    #[error("Knowledge base named '{0}' already exists.")]
    KnowledgeAlreadyExists(String),

    #[error("Document '{0}' not found in knowledge base.")]
    DocumentNotFound(String),

    #[error("No embedding recorded for document '{0}'.")]
    EmbeddingNotFound(String),

    // Input errors (E100-E199)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Config errors (E200-E299)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Backend errors (E300-E399)
    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Vector store error: {0}")]
    VectorStoreError(String),

    #[error("Graph store error: {0}")]
    GraphStoreError(String),

    #[error("Network error: {0}. Check the embedding endpoint and your connection.")]
    NetworkError(#[from] reqwest::Error),

    // Retrieval errors (E400-E499)
    #[error("Both retrievers failed: vector={vector}, graph={graph}")]
    RetrievalFailed { vector: String, graph: String },

    #[error("Retrieval cancelled")]
    Cancelled,

    // Persistence errors (E500-E599)
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error(
        "Index updated for knowledge base '{knowledge_id}' but saving the knowledge base failed: {message}"
    )]
    IndexAheadOfStore {
        knowledge_id: String,
        message: String,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::KnowledgeNotFound(_) => "E001",
            Self::KnowledgeAlreadyExists(_) => "E002",
            Self::DocumentNotFound(_) => "E003",
            Self::EmbeddingNotFound(_) => "E004",
            Self::InvalidInput(_) => "E100",
            Self::ConfigError(_) => "E200",
            Self::EmbeddingFailed(_) => "E300",
            Self::VectorStoreError(_) => "E301",
            Self::GraphStoreError(_) => "E302",
            Self::NetworkError(_) => "E303",
            Self::RetrievalFailed { .. } => "E400",
            Self::Cancelled => "E401",
            Self::PersistenceError(_) => "E500",
            Self::IndexAheadOfStore { .. } => "E501",
            Self::Json(_) => "E502",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::KnowledgeNotFound(_) => Some("hybridrag kb list".to_string()),
            Self::KnowledgeAlreadyExists(name) => Some(format!("hybridrag kb show {}", name)),
            Self::EmbeddingNotFound(_) => Some("hybridrag embed <knowledge-id>".to_string()),
            Self::ConfigError(_) => Some("hybridrag config list".to_string()),
            Self::NetworkError(_) => Some("hybridrag config get embedding.base_url".to_string()),
            Self::IndexAheadOfStore { knowledge_id, .. } => {
                Some(format!("hybridrag kb show {}", knowledge_id))
            }
            _ => None,
        }
    }

    /// Whether this error came from the partial-write path where the external
    /// index was updated but the aggregate was not persisted
    pub fn is_index_ahead_of_store(&self) -> bool {
        matches!(self, Self::IndexAheadOfStore { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knowledge_not_found_error() {
        let error = Error::KnowledgeNotFound("kb-1".to_string());
        assert_eq!(error.code(), "E001");
        assert_eq!(error.suggestion(), Some("hybridrag kb list".to_string()));
        assert!(error.to_string().contains("kb-1"));
    }

    #[test]
    fn test_retrieval_failed_combines_both_messages() {
        let error = Error::RetrievalFailed {
            vector: "vector down".into(),
            graph: "graph down".into(),
        };
        assert_eq!(error.code(), "E400");
        let message = error.to_string();
        assert!(message.contains("vector down"));
        assert!(message.contains("graph down"));
    }

    #[test]
    fn test_index_ahead_of_store_is_detectable() {
        let error = Error::IndexAheadOfStore {
            knowledge_id: "kb-2".into(),
            message: "disk full".into(),
        };
        assert!(error.is_index_ahead_of_store());
        assert_eq!(error.code(), "E501");
        assert_eq!(error.suggestion(), Some("hybridrag kb show kb-2".to_string()));
        assert!(!Error::Cancelled.is_index_ahead_of_store());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: Error = io.into();
        assert_eq!(error.code(), "E9999");
        assert_eq!(error.suggestion(), None);
    }
}
