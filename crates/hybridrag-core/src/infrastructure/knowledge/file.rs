//! JSON-file knowledge repository
//!
//! One pretty-printed `{id}.json` per knowledge base:
//! ```text
//! <data_dir>/knowledge/
//! ├── 5f0c...e1.json
//! └── 9a7d...42.json
//! ```
//! Writes go to a `.tmp` sibling first and are renamed into place, so a
//! crash never leaves a half-written record behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::knowledge::{Knowledge, KnowledgeRepository};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct FileKnowledgeRepository {
    dir: PathBuf,
}

impl FileKnowledgeRepository {
    /// Use `dir` for records, creating it if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            Error::PersistenceError(format!("failed to create knowledge directory {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record path, or `None` for ids that are not a plain file name
    fn record_path(&self, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\']);
        valid.then(|| self.dir.join(format!("{}.json", id)))
    }

    async fn read_record(path: &Path) -> Result<Option<Knowledge>> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                let knowledge = serde_json::from_str(&contents).map_err(|e| {
                    Error::PersistenceError(format!("corrupt knowledge record {}: {}", path.display(), e))
                })?;
                Ok(Some(knowledge))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::PersistenceError(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl KnowledgeRepository for FileKnowledgeRepository {
    async fn save(&self, knowledge: &Knowledge) -> Result<()> {
        let path = self
            .record_path(knowledge.id())
            .ok_or_else(|| Error::InvalidInput(format!("invalid knowledge id: {}", knowledge.id())))?;
        let tmp = path.with_extension("json.tmp");

        let contents = serde_json::to_string_pretty(knowledge)?;
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| Error::PersistenceError(format!("failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::PersistenceError(format!("failed to replace {}: {}", path.display(), e)))?;

        debug!(knowledge_id = %knowledge.id(), path = %path.display(), "Knowledge saved");
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Knowledge>> {
        match self.record_path(id) {
            Some(path) => Self::read_record(&path).await,
            None => Ok(None),
        }
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Knowledge>> {
        Ok(self.list().await?.into_iter().find(|k| k.name() == name))
    }

    async fn list(&self) -> Result<Vec<Knowledge>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| Error::PersistenceError(format!("failed to list {}: {}", self.dir.display(), e)))?;

        let mut all = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(Some(knowledge)) => all.push(knowledge),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable knowledge record"),
            }
        }

        all.sort_by(|a, b| a.created_at().cmp(&b.created_at()).then_with(|| a.id().cmp(b.id())));
        Ok(all)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let Some(path) = self.record_path(id) else {
            return Ok(false);
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::PersistenceError(format!(
                "failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
