//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::retrieval::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_LIMIT, RRF_K};

/// Hybridrag configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Chunking parameters. Non-positive values fall back to the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub chunk_size: i64,
    pub chunk_overlap: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_limit: i64,
    pub rrf_k: f32,
    pub rerank: bool,
    pub rerank_case_sensitive: bool,
    pub graph_max_hops: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    /// `hashing` (offline, deterministic) or `openai` (HTTP endpoint)
    pub provider: String,
    pub model: String,
    pub dimension: usize,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: Option<PathBuf>,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE as i64,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP as i64,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT as i64,
            rrf_k: RRF_K,
            rerank: true,
            rerank_case_sensitive: true,
            graph_max_hops: 2,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: "hashing".to_string(),
            model: "hashing-256".to_string(),
            dimension: 256,
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Validated chunking settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexingSettings {
    /// Width of each chunk window, in characters
    pub chunk_size: usize,
    /// How far each window steps back into the previous one
    pub chunk_overlap: usize,
}

impl IndexingConfig {
    /// Apply defaults to non-positive values and check `chunk_overlap < chunk_size`
    pub fn resolve(&self) -> crate::Result<IndexingSettings> {
        let chunk_size = if self.chunk_size <= 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            self.chunk_size as usize
        };
        let chunk_overlap = if self.chunk_overlap < 0 {
            DEFAULT_CHUNK_OVERLAP
        } else {
            self.chunk_overlap as usize
        };

        if chunk_overlap >= chunk_size {
            return Err(crate::Error::ConfigError(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(IndexingSettings {
            chunk_size,
            chunk_overlap,
        })
    }
}

impl RetrievalConfig {
    /// Fallback result count used when a caller asks for zero results
    pub fn resolved_limit(&self) -> usize {
        if self.default_limit <= 0 {
            DEFAULT_LIMIT
        } else {
            self.default_limit as usize
        }
    }
}

impl EmbeddingConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("HYBRIDRAG_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .ok())
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| opt.map(|key| redact(&key)))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "Embedding API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

/// Keep only the last four characters of a secret
fn redact(key: &str) -> String {
    let count = key.chars().count();
    if count <= 4 {
        return "***".to_string();
    }
    let suffix: String = key.chars().skip(count - 4).collect();
    format!("***{}", suffix)
}

const PROVIDERS: [&str; 2] = ["hashing", "openai"];

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("HYBRIDRAG_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("hybridrag")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Directory holding knowledge bases and index snapshots
    pub fn data_dir(&self) -> anyhow::Result<PathBuf> {
        if let Ok(custom_dir) = env::var("HYBRIDRAG_DATA_DIR") {
            return Ok(PathBuf::from(custom_dir));
        }
        if let Some(dir) = &self.storage.data_dir {
            return Ok(dir.clone());
        }
        Ok(dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?
            .join("hybridrag"))
    }

    /// Load configuration from file, or return defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.embedding.enforce_env_only()?;
        self.indexing.resolve()?;
        if !PROVIDERS.contains(&self.embedding.provider.as_str()) {
            return Err(anyhow!(
                "Invalid embedding provider: {}. Valid options: {}",
                self.embedding.provider,
                PROVIDERS.join(", ")
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(anyhow!("Embedding dimension must be positive"));
        }
        if !(self.retrieval.rrf_k > 0.0) {
            return Err(anyhow!("rrf_k must be positive"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "indexing.chunk_size" => Ok(self.indexing.chunk_size.to_string()),
            "indexing.chunk_overlap" => Ok(self.indexing.chunk_overlap.to_string()),

            "retrieval.default_limit" => Ok(self.retrieval.default_limit.to_string()),
            "retrieval.rrf_k" => Ok(self.retrieval.rrf_k.to_string()),
            "retrieval.rerank" => Ok(self.retrieval.rerank.to_string()),
            "retrieval.rerank_case_sensitive" => {
                Ok(self.retrieval.rerank_case_sensitive.to_string())
            }
            "retrieval.graph_max_hops" => Ok(self.retrieval.graph_max_hops.to_string()),

            "embedding.provider" => Ok(self.embedding.provider.clone()),
            "embedding.model" => Ok(self.embedding.model.clone()),
            "embedding.dimension" => Ok(self.embedding.dimension.to_string()),
            "embedding.base_url" => Ok(self.embedding.base_url.clone()),
            "embedding.timeout_secs" => Ok(self.embedding.timeout_secs.to_string()),

            "storage.data_dir" => Ok(self
                .storage
                .data_dir
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "(default)".to_string())),

            "embedding.api_key" | "api_key" => match self.embedding.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok("(not set - use HYBRIDRAG_API_KEY or OPENAI_API_KEY env var)".to_string()),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `hybridrag config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "indexing.chunk_size" => {
                self.indexing.chunk_size = value
                    .parse()
                    .with_context(|| format!("Invalid chunk_size value: {}", value))?;
            }
            "indexing.chunk_overlap" => {
                self.indexing.chunk_overlap = value
                    .parse()
                    .with_context(|| format!("Invalid chunk_overlap value: {}", value))?;
            }

            "retrieval.default_limit" => {
                self.retrieval.default_limit = value
                    .parse()
                    .with_context(|| format!("Invalid default_limit value: {}", value))?;
            }
            "retrieval.rrf_k" => {
                let k: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid rrf_k value: {}", value))?;
                if !(k > 0.0) {
                    return Err(anyhow!("rrf_k must be positive"));
                }
                self.retrieval.rrf_k = k;
            }
            "retrieval.rerank" => {
                self.retrieval.rerank = value
                    .parse()
                    .with_context(|| format!("Invalid rerank value: {}", value))?;
            }
            "retrieval.rerank_case_sensitive" => {
                self.retrieval.rerank_case_sensitive = value
                    .parse()
                    .with_context(|| format!("Invalid rerank_case_sensitive value: {}", value))?;
            }
            "retrieval.graph_max_hops" => {
                self.retrieval.graph_max_hops = value
                    .parse()
                    .with_context(|| format!("Invalid graph_max_hops value: {}", value))?;
            }

            "embedding.provider" => {
                if !PROVIDERS.contains(&value) {
                    return Err(anyhow!(
                        "Invalid embedding provider: {}. Valid options: {}",
                        value,
                        PROVIDERS.join(", ")
                    ));
                }
                self.embedding.provider = value.to_string();
            }
            "embedding.model" => {
                self.embedding.model = value.to_string();
            }
            "embedding.dimension" => {
                let dimension: usize = value
                    .parse()
                    .with_context(|| format!("Invalid dimension value: {}", value))?;
                if dimension == 0 {
                    return Err(anyhow!("Embedding dimension must be positive"));
                }
                self.embedding.dimension = dimension;
            }
            "embedding.base_url" => {
                self.embedding.base_url = value.trim_end_matches('/').to_string();
            }
            "embedding.timeout_secs" => {
                self.embedding.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }

            "storage.data_dir" => {
                self.storage.data_dir = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }

            "embedding.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the HYBRIDRAG_API_KEY or OPENAI_API_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `hybridrag config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = vec![
            "indexing.chunk_size",
            "indexing.chunk_overlap",
            "retrieval.default_limit",
            "retrieval.rrf_k",
            "retrieval.rerank",
            "retrieval.rerank_case_sensitive",
            "retrieval.graph_max_hops",
            "embedding.provider",
            "embedding.model",
            "embedding.dimension",
            "embedding.base_url",
            "embedding.timeout_secs",
            "embedding.api_key",
            "storage.data_dir",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}
