//! Persistence port for the knowledge aggregate

use async_trait::async_trait;

use crate::error::Result;

use super::entity::Knowledge;

/// Storage for whole [`Knowledge`] aggregates
#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    /// Save a knowledge base (insert or replace)
    async fn save(&self, knowledge: &Knowledge) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Knowledge>>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Knowledge>>;

    /// All knowledge bases, oldest first
    async fn list(&self) -> Result<Vec<Knowledge>>;

    /// Returns whether a record was removed
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.find_by_id(id).await?.is_some())
    }
}
