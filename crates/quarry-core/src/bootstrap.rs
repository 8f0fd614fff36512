//! Builds a ready-to-run indexing pipeline from a validated [`Config`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use quarry_embed::{
    ClientConfig, Clock, EmbeddingCache, EmbeddingClient, RateLimiter, SystemClock,
    VoyageProvider,
};
use quarry_index::chunker::{ChunkerConfig, FileChunker};
use quarry_index::contextualizer::{ClaudeContextualizer, Contextualizer};
use quarry_index::discovery::PathFilter;
use quarry_index::pipeline::{IndexingPipeline, PipelineConfig};
use quarry_index::store::{QdrantStorage, Storage};
use quarry_index::sync::ChangeTracker;

use crate::config::{CONTEXT_API_KEY, Config, EMBEDDING_API_KEY};

/// # Errors
///
/// Returns an error if an include or exclude pattern is not a valid glob.
pub fn build_filter(config: &Config) -> anyhow::Result<PathFilter> {
    let filter = PathFilter::new(&config.workspace.include, &config.workspace.exclude)
        .context("invalid workspace include/exclude pattern")?;
    Ok(filter.with_ignore_files(config.workspace.respect_ignore_files))
}

/// # Errors
///
/// Returns an error if `root` is not a directory or the patterns are invalid.
pub fn build_tracker(config: &Config, root: &Path) -> anyhow::Result<ChangeTracker> {
    let filter = build_filter(config)?;
    ChangeTracker::new(root, config.workspace.resolved_snapshot_dir(), filter)
        .with_context(|| format!("cannot track workspace {}", root.display()))
}

/// # Errors
///
/// Returns an error if the embedding API key is missing.
pub fn build_embedder(
    config: &Config,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<EmbeddingClient<VoyageProvider>> {
    let key = config
        .secrets
        .embedding_api_key
        .as_ref()
        .with_context(|| format!("{EMBEDDING_API_KEY} is not set"))?;
    let provider = VoyageProvider::new(
        key.expose().to_owned(),
        config.embedding.base_url.clone(),
        Duration::from_secs(config.embedding.timeout_secs),
    )
    .with_max_retries(config.embedding.max_retries);

    Ok(EmbeddingClient::new(
        provider,
        EmbeddingCache::new(
            Duration::from_secs(config.embedding.cache_ttl_secs),
            Arc::clone(&clock),
        ),
        RateLimiter::new(config.embedding.requests_per_minute, clock),
        ClientConfig {
            max_batch_size: config.embedding.max_batch_size,
            prices: config.price_table(),
        },
    ))
}

/// `None` when contexts are disabled or no key is configured.
#[must_use]
pub fn build_contextualizer(config: &Config) -> Option<Arc<dyn Contextualizer>> {
    if !config.context.enabled {
        return None;
    }
    let Some(key) = config.secrets.context_api_key.as_ref() else {
        tracing::info!("{CONTEXT_API_KEY} not set, using fallback contexts");
        return None;
    };
    let contextualizer = ClaudeContextualizer::new(
        key.expose().to_owned(),
        config.context.model.clone(),
        config.context.max_tokens,
        Duration::from_secs(config.embedding.timeout_secs),
    )
    .with_max_retries(config.embedding.max_retries);
    Some(Arc::new(contextualizer))
}

/// # Errors
///
/// Returns an error if the Qdrant client cannot be built.
pub fn build_storage(config: &Config) -> anyhow::Result<Arc<dyn Storage>> {
    let url = config.storage.url();
    let storage =
        QdrantStorage::new(&url).with_context(|| format!("cannot connect to Qdrant at {url}"))?;
    Ok(Arc::new(storage))
}

#[must_use]
pub fn pipeline_config(config: &Config) -> PipelineConfig {
    PipelineConfig {
        workspace_id: config.workspace.id.clone(),
        collection_prefix: config.storage.collection_prefix.clone(),
        model: config.embedding.model,
        vector_size: config.embedding.dimension,
        context_batch_size: config.context.batch_size,
        storage_batch_size: config.storage.batch_size,
        file_delay: Duration::from_millis(config.context.file_delay_ms),
        max_files: config.workspace.max_files,
    }
}

/// Wire tracker, chunker, embedder, contextualizer and `storage` together.
///
/// # Errors
///
/// Returns an error if the workspace or the embedding client cannot be set up.
pub fn build_pipeline(
    config: &Config,
    root: &Path,
    storage: Arc<dyn Storage>,
) -> anyhow::Result<IndexingPipeline<VoyageProvider>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let tracker = build_tracker(config, root)?;
    let chunker = FileChunker::new(ChunkerConfig {
        target_tokens: config.chunker.target_tokens,
        max_tokens: config.chunker.max_tokens,
    });
    let embedder = build_embedder(config, Arc::clone(&clock))?;

    let mut pipeline =
        IndexingPipeline::new(tracker, chunker, embedder, storage, pipeline_config(config))
            .with_clock(clock);
    if let Some(contextualizer) = build_contextualizer(config) {
        pipeline = pipeline.with_contextualizer(contextualizer);
    }
    Ok(pipeline)
}
