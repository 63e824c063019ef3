//! In-memory knowledge repository

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::knowledge::{Knowledge, KnowledgeRepository};
use crate::error::Result;

/// Keeps aggregates in a map; useful for tests and one-shot processes
#[derive(Debug, Default)]
pub struct InMemoryKnowledgeRepository {
    records: RwLock<HashMap<String, Knowledge>>,
}

impl InMemoryKnowledgeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KnowledgeRepository for InMemoryKnowledgeRepository {
    async fn save(&self, knowledge: &Knowledge) -> Result<()> {
        self.records
            .write()
            .await
            .insert(knowledge.id().to_string(), knowledge.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Knowledge>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Knowledge>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|k| k.name() == name)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Knowledge>> {
        let mut all: Vec<Knowledge> = self.records.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then_with(|| a.id().cmp(b.id())));
        Ok(all)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.records.write().await.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_crud() {
        let repo = InMemoryKnowledgeRepository::new();
        let knowledge = Knowledge::new("docs", "d").unwrap();
        repo.save(&knowledge).await.unwrap();

        assert!(repo.exists(knowledge.id()).await.unwrap());
        assert_eq!(repo.find_by_name("docs").await.unwrap().unwrap().id(), knowledge.id());
        assert!(repo.find_by_name("other").await.unwrap().is_none());
        assert_eq!(repo.list().await.unwrap().len(), 1);

        assert!(repo.delete(knowledge.id()).await.unwrap());
        assert!(!repo.delete(knowledge.id()).await.unwrap());
        assert!(repo.find_by_id(knowledge.id()).await.unwrap().is_none());
    }
}
