//! Configuration module for docrag.
//!
//! Handles loading, validating, and providing default configuration values.
//! Credentials are never stored in the file; only the name of the
//! environment variable that carries them.
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RagError;
use crate::indexer::chunker::ChunkSettings;

/// Config file used when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "docrag.json";

// ── Default value functions ──────────────────────────────────────────

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./documents")
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/vector_index.db")
}

fn default_collection() -> String {
    "documents".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["txt".to_string(), "md".to_string()]
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_search_top_k() -> usize {
    3
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimensions() -> usize {
    1536
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_batch_size() -> usize {
    64
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_chat_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_chat_timeout() -> u64 {
    60
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

fn default_snippet_chars() -> usize {
    300
}

fn default_true() -> bool {
    true
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,

    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// `openai` or `mock`.
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_chat_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Reference snippets are cut to this many characters.
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,

    #[serde(default = "default_true")]
    pub build_on_start: bool,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            index_path: default_index_path(),
            collection: default_collection(),
            extensions: default_extensions(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            search_top_k: default_search_top_k(),
            embedding: EmbeddingConfig::default(),
            chat: ChatConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            batch_size: default_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            api_base: default_api_base(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_chat_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origins: default_allowed_origins(),
            snippet_chars: default_snippet_chars(),
            build_on_start: default_true(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If the file does not exist, returns a default config and, for the
    /// default path only, writes a template next to the working directory.
    /// Invalid JSON falls back to defaults with a warning.
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        if !config_path.exists() {
            info!("{} not found, using defaults", config_path.display());
            let cfg = Self::default();

            if config_path == Path::new(DEFAULT_CONFIG_PATH) {
                match cfg.save(config_path) {
                    Ok(()) => info!("Generated config template: {}", config_path.display()),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read config: {}", config_path.display()))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {}: {e}", config_path.display());
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {}", config_path.display());
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data)
            .with_context(|| format!("failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), RagError> {
        let ensure = |ok: bool, msg: &str| {
            if ok {
                Ok(())
            } else {
                Err(RagError::Configuration(msg.to_string()))
            }
        };
        ensure(self.chunk_size > 0, "chunk_size must be positive")?;
        ensure(self.chunk_overlap > 0, "chunk_overlap must be positive")?;
        ensure(
            self.chunk_overlap < self.chunk_size,
            "chunk_overlap must be smaller than chunk_size",
        )?;
        ensure(self.search_top_k > 0, "search_top_k must be positive")?;
        ensure(
            self.embedding.dimensions > 0,
            "embedding.dimensions must be positive",
        )?;
        ensure(
            self.embedding.batch_size > 0,
            "embedding.batch_size must be positive",
        )?;
        ensure(
            !self.extensions.is_empty(),
            "at least one document extension must be specified",
        )?;
        ensure(!self.collection.is_empty(), "collection must not be empty")?;
        Ok(())
    }

    /// Chunking parameters derived from this config.
    pub fn chunk_settings(&self) -> Result<ChunkSettings, RagError> {
        ChunkSettings::new(self.chunk_size, self.chunk_overlap)
    }

    /// Read a credential from the named environment variable.
    pub fn api_key(env_name: &str) -> Result<String, RagError> {
        match std::env::var(env_name) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(RagError::Configuration(format!(
                "environment variable {env_name} is not set"
            ))),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
