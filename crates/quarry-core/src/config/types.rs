use std::collections::BTreeMap;
use std::path::PathBuf;

use quarry_embed::EmbeddingModel;
use serde::{Deserialize, Serialize};

use crate::secret::Secret;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub chunker: ChunkerSection,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

fn default_embedding_base_url() -> String {
    quarry_embed::voyage::DEFAULT_BASE_URL.into()
}

fn default_embedding_model() -> EmbeddingModel {
    EmbeddingModel::Code
}

fn default_max_batch_size() -> usize {
    quarry_embed::client::DEFAULT_MAX_BATCH_SIZE
}

fn default_requests_per_minute() -> usize {
    300
}

fn default_cache_ttl_secs() -> u64 {
    quarry_embed::DEFAULT_TTL.as_secs()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_dimension() -> u64 {
    quarry_index::pipeline::DEFAULT_VECTOR_SIZE
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: EmbeddingModel,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: usize,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Vector size the model returns; collections are created with it.
    #[serde(default = "default_dimension")]
    pub dimension: u64,
    /// USD per million tokens, keyed by model name (`fast`, `code`, `long-context`).
    #[serde(default)]
    pub pricing: BTreeMap<String, f64>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            max_batch_size: default_max_batch_size(),
            requests_per_minute: default_requests_per_minute(),
            cache_ttl_secs: default_cache_ttl_secs(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            dimension: default_dimension(),
            pricing: BTreeMap::new(),
        }
    }
}

fn default_context_enabled() -> bool {
    true
}

fn default_context_model() -> String {
    quarry_index::contextualizer::DEFAULT_CONTEXT_MODEL.into()
}

fn default_context_batch_size() -> usize {
    quarry_index::pipeline::DEFAULT_CONTEXT_BATCH_SIZE
}

fn default_context_max_tokens() -> u32 {
    150
}

fn default_file_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextConfig {
    #[serde(default = "default_context_enabled")]
    pub enabled: bool,
    #[serde(default = "default_context_model")]
    pub model: String,
    #[serde(default = "default_context_batch_size")]
    pub batch_size: usize,
    /// Output token budget per chunk.
    #[serde(default = "default_context_max_tokens")]
    pub max_tokens: u32,
    /// Pause between files during a full run.
    #[serde(default = "default_file_delay_ms")]
    pub file_delay_ms: u64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: default_context_enabled(),
            model: default_context_model(),
            batch_size: default_context_batch_size(),
            max_tokens: default_context_max_tokens(),
            file_delay_ms: default_file_delay_ms(),
        }
    }
}

fn default_storage_host() -> String {
    "localhost".into()
}

fn default_storage_port() -> u16 {
    6334
}

fn default_collection_prefix() -> String {
    "quarry".into()
}

fn default_storage_batch_size() -> usize {
    quarry_index::pipeline::DEFAULT_STORAGE_BATCH_SIZE
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_host")]
    pub host: String,
    #[serde(default = "default_storage_port")]
    pub port: u16,
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
    #[serde(default = "default_storage_batch_size")]
    pub batch_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            host: default_storage_host(),
            port: default_storage_port(),
            collection_prefix: default_collection_prefix(),
            batch_size: default_storage_batch_size(),
        }
    }
}

impl StorageConfig {
    /// gRPC endpoint of the Qdrant server.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

fn default_respect_ignore_files() -> bool {
    true
}

fn default_include() -> Vec<String> {
    [
        "*.rs", "*.py", "*.js", "*.jsx", "*.mjs", "*.ts", "*.tsx", "*.go", "*.java", "*.c",
        "*.h", "*.cpp", "*.hpp", "*.rb", "*.sh", "*.toml", "*.json", "*.yaml", "*.yml", "*.md",
        "*.txt", "*.rst",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_exclude() -> Vec<String> {
    [
        ".git/",
        "node_modules/",
        "target/",
        "__pycache__/",
        ".venv/",
        "dist/",
        "build/",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    /// Payload workspace id. Defaults to the workspace path hash.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    #[serde(default = "default_exclude")]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub max_files: Option<usize>,
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,
    /// Skip hidden paths and paths listed in `.gitignore`/`.ignore` files.
    #[serde(default = "default_respect_ignore_files")]
    pub respect_ignore_files: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            id: None,
            include: default_include(),
            exclude: default_exclude(),
            max_files: None,
            snapshot_dir: None,
            respect_ignore_files: true,
        }
    }
}

impl WorkspaceConfig {
    /// Configured snapshot directory, else `<cache dir>/quarry/snapshots`.
    #[must_use]
    pub fn resolved_snapshot_dir(&self) -> PathBuf {
        self.snapshot_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("quarry")
                .join("snapshots")
        })
    }
}

fn default_target_tokens() -> usize {
    512
}

fn default_chunk_max_tokens() -> usize {
    1024
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ChunkerSection {
    #[serde(default = "default_target_tokens")]
    pub target_tokens: usize,
    #[serde(default = "default_chunk_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkerSection {
    fn default() -> Self {
        Self {
            target_tokens: default_target_tokens(),
            max_tokens: default_chunk_max_tokens(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub embedding_api_key: Option<Secret>,
    pub context_api_key: Option<Secret>,
}
