//! Indexing orchestrator: discover → chunk → contextualize → embed → store.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use quarry_embed::{
    Clock, EmbeddingClient, EmbeddingModel, EmbeddingProvider, InputType, SystemClock,
};

use crate::chunker::{Chunk, FileChunker};
use crate::contextualizer::{ChunkContext, Contextualizer, fallback_context};
use crate::discovery::{absolute_path, discover_files};
use crate::document::{Document, TextViews};
use crate::error::Result;
use crate::languages::language_for;
use crate::progress::{IndexingPhase, IndexingProgress};
use crate::store::{CollectionInfo, Storage};
use crate::sync::{ChangeSet, ChangeTracker, diff};

pub const DEFAULT_VECTOR_SIZE: u64 = 1024;
pub const DEFAULT_CONTEXT_BATCH_SIZE: usize = 10;
pub const DEFAULT_STORAGE_BATCH_SIZE: usize = 100;
pub const DEFAULT_FILE_DELAY: Duration = Duration::from_secs(1);

/// Invoked after every processed file and every stored batch.
pub type ProgressCallback = Box<dyn FnMut(&IndexingProgress) + Send>;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Stored in every payload. Defaults to the workspace path hash.
    pub workspace_id: Option<String>,
    pub collection_prefix: String,
    pub model: EmbeddingModel,
    /// Must match the dimension the embedding model returns.
    pub vector_size: u64,
    pub context_batch_size: usize,
    pub storage_batch_size: usize,
    /// Pause between files so the contextualizer stays under its token quota.
    pub file_delay: Duration,
    pub max_files: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workspace_id: None,
            collection_prefix: "quarry".into(),
            model: EmbeddingModel::Code,
            vector_size: DEFAULT_VECTOR_SIZE,
            context_batch_size: DEFAULT_CONTEXT_BATCH_SIZE,
            storage_batch_size: DEFAULT_STORAGE_BATCH_SIZE,
            file_delay: DEFAULT_FILE_DELAY,
            max_files: None,
        }
    }
}

/// Per-workspace collection names, one for code and one for prose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionNames {
    pub code: String,
    pub docs: String,
}

impl CollectionNames {
    #[must_use]
    pub fn new(prefix: &str, workspace_hash: &str) -> Self {
        Self {
            code: format!("{prefix}_code_{workspace_hash}"),
            docs: format!("{prefix}_docs_{workspace_hash}"),
        }
    }

    /// Collection a workspace-relative path is stored in.
    #[must_use]
    pub fn for_path(&self, relative: &str) -> &str {
        if language_for(Path::new(relative)).is_code() {
            &self.code
        } else {
            &self.docs
        }
    }

    fn both(&self) -> [&str; 2] {
        [&self.code, &self.docs]
    }
}

/// Owns every collaborator of an indexing run for one workspace.
pub struct IndexingPipeline<P> {
    tracker: ChangeTracker,
    chunker: FileChunker,
    embedder: EmbeddingClient<P>,
    storage: Arc<dyn Storage>,
    contextualizer: Option<Arc<dyn Contextualizer>>,
    clock: Arc<dyn Clock>,
    collections: CollectionNames,
    workspace_id: String,
    config: PipelineConfig,
    on_progress: Option<ProgressCallback>,
}

impl<P> std::fmt::Debug for IndexingPipeline<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexingPipeline")
            .field("tracker", &self.tracker)
            .field("collections", &self.collections)
            .field("workspace_id", &self.workspace_id)
            .field("contextualizer", &self.contextualizer.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<P: EmbeddingProvider> IndexingPipeline<P> {
    #[must_use]
    pub fn new(
        tracker: ChangeTracker,
        chunker: FileChunker,
        embedder: EmbeddingClient<P>,
        storage: Arc<dyn Storage>,
        config: PipelineConfig,
    ) -> Self {
        let collections = CollectionNames::new(&config.collection_prefix, tracker.workspace_hash());
        let workspace_id = config
            .workspace_id
            .clone()
            .unwrap_or_else(|| tracker.workspace_hash().to_owned());
        Self {
            tracker,
            chunker,
            embedder,
            storage,
            contextualizer: None,
            clock: Arc::new(SystemClock),
            collections,
            workspace_id,
            config,
            on_progress: None,
        }
    }

    /// Without a contextualizer every chunk gets [`fallback_context`].
    #[must_use]
    pub fn with_contextualizer(mut self, contextualizer: Arc<dyn Contextualizer>) -> Self {
        self.contextualizer = Some(contextualizer);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    #[must_use]
    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    #[must_use]
    pub fn embedder(&self) -> &EmbeddingClient<P> {
        &self.embedder
    }

    #[must_use]
    pub fn collections(&self) -> &CollectionNames {
        &self.collections
    }

    #[must_use]
    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// Index every discovered file and store the resulting documents.
    ///
    /// Per-file failures and storage insert failures are counted in the
    /// returned progress instead of aborting the run. On success the snapshot
    /// is advanced to the files that were indexed.
    ///
    /// # Errors
    ///
    /// Returns an error if the collections cannot be created.
    pub async fn index_workspace(&mut self) -> Result<IndexingProgress> {
        let mut progress = IndexingProgress::default();

        let files = discover_files(
            self.tracker.root(),
            self.tracker.filter(),
            self.config.max_files,
        );
        progress.files_total = files.len();
        if files.is_empty() {
            tracing::warn!(workspace = %self.tracker.root().display(), "no files matched");
            progress.phase = IndexingPhase::Complete;
            return Ok(progress);
        }
        tracing::info!(files = files.len(), "indexing started");

        progress.phase = IndexingPhase::EnsuringStorage;
        self.ensure_collections().await?;

        progress.phase = IndexingPhase::Processing;
        let mut code_docs = Vec::new();
        let mut prose_docs = Vec::new();
        let mut failed = BTreeSet::new();
        let total = files.len();

        for (i, rel) in files.iter().enumerate() {
            match self.process_file(rel, &mut progress).await {
                Ok(docs) => {
                    tracing::info!(
                        file = %rel,
                        progress = format_args!("{}/{total}", i + 1),
                        chunks = docs.len(),
                    );
                    if self.collections.for_path(rel) == self.collections.code {
                        code_docs.extend(docs);
                    } else {
                        prose_docs.extend(docs);
                    }
                }
                Err(e) => {
                    progress.errors += 1;
                    failed.insert(rel.clone());
                    tracing::warn!(file = %rel, "failed to index file: {e:#}");
                }
            }
            progress.files_processed += 1;
            self.notify(&progress);

            if i + 1 < total {
                self.clock.sleep(self.config.file_delay).await;
            }
        }

        progress.phase = IndexingPhase::Storing;
        let collections = self.collections.clone();
        let mut stored = true;
        for (collection, docs) in [(&collections.code, code_docs), (&collections.docs, prose_docs)]
        {
            if !self.store_documents(collection, &docs, &mut progress).await {
                stored = false;
                break;
            }
        }

        progress.phase = IndexingPhase::Complete;
        if stored {
            let indexed: BTreeSet<&String> = files.iter().filter(|f| !failed.contains(*f)).collect();
            let mut snapshot = self.tracker.scan();
            snapshot.files.retain(|path, _| indexed.contains(path));
            if let Err(e) = self.tracker.save(&snapshot) {
                tracing::warn!("failed to save snapshot: {e:#}");
            }
        }

        tracing::info!(
            files = progress.files_processed,
            chunks = progress.chunks_indexed,
            errors = progress.errors,
            cost_usd = progress.cost_usd,
            "indexing complete: {progress}"
        );
        Ok(progress)
    }

    /// Replace the stored points of one workspace-relative file.
    ///
    /// # Errors
    ///
    /// Returns the first chunking, embedding or storage error.
    pub async fn index_file(&mut self, relative: &str) -> Result<IndexingProgress> {
        let mut progress = IndexingProgress {
            files_total: 1,
            ..IndexingProgress::default()
        };
        progress.phase = IndexingPhase::EnsuringStorage;
        self.ensure_collections().await?;

        progress.phase = IndexingPhase::Processing;
        self.reindex_one(relative, &mut progress).await?;
        progress.phase = IndexingPhase::Complete;
        Ok(progress)
    }

    /// Bring the index in line with the workspace: drop points of removed
    /// files, re-index modified files and index added ones.
    ///
    /// Files that fail keep their previous snapshot entry so the next call
    /// retries them.
    ///
    /// # Errors
    ///
    /// Returns an error if the collections cannot be created or the snapshot
    /// cannot be saved.
    pub async fn index_changes(&mut self) -> Result<(ChangeSet, IndexingProgress)> {
        let previous = self.tracker.load();
        let mut snapshot = self.tracker.scan();
        let changes = diff(previous.as_ref(), &snapshot);

        let mut progress = IndexingProgress {
            files_total: changes.added.len() + changes.modified.len(),
            ..IndexingProgress::default()
        };
        if changes.is_empty() {
            progress.phase = IndexingPhase::Complete;
            return Ok((changes, progress));
        }
        tracing::info!(%changes, "applying workspace changes");

        progress.phase = IndexingPhase::EnsuringStorage;
        self.ensure_collections().await?;

        progress.phase = IndexingPhase::Processing;
        let mut failed = BTreeSet::new();

        for rel in &changes.removed {
            let collection = self.collections.for_path(rel).to_owned();
            if let Err(e) = self.storage.delete_file_points(&collection, rel).await {
                progress.errors += 1;
                failed.insert(rel.clone());
                tracing::warn!(file = %rel, "failed to remove points: {e:#}");
            }
        }

        let to_index: Vec<&String> = changes.modified.iter().chain(&changes.added).collect();
        for (i, rel) in to_index.iter().enumerate() {
            if let Err(e) = self.reindex_one(rel, &mut progress).await {
                progress.errors += 1;
                progress.files_processed += 1;
                failed.insert((*rel).clone());
                tracing::warn!(file = %rel, "failed to index file: {e:#}");
                self.notify(&progress);
            }
            if i + 1 < to_index.len() {
                self.clock.sleep(self.config.file_delay).await;
            }
        }

        for rel in &failed {
            match previous.as_ref().and_then(|p| p.files.get(rel)) {
                Some(entry) => {
                    snapshot.files.insert(rel.clone(), entry.clone());
                }
                None => {
                    snapshot.files.remove(rel);
                }
            }
        }
        self.tracker.save(&snapshot)?;

        progress.phase = IndexingPhase::Complete;
        tracing::info!(errors = progress.errors, "update complete: {progress}");
        Ok((changes, progress))
    }

    /// Info for whichever of the two collections exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be queried.
    pub async fn collection_info(&self) -> Result<Vec<CollectionInfo>> {
        let mut infos = Vec::new();
        for name in self.collections.both() {
            if let Some(info) = self.storage.collection_info(name).await? {
                infos.push(info);
            }
        }
        Ok(infos)
    }

    /// Delete both collections and the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if a collection or the snapshot cannot be removed.
    pub async fn reset(&mut self) -> Result<()> {
        for name in self.collections.both() {
            self.storage.delete_collection(name).await?;
        }
        self.tracker.reset()?;
        tracing::info!(workspace = %self.tracker.root().display(), "index reset");
        Ok(())
    }

    async fn ensure_collections(&self) -> Result<()> {
        for name in self.collections.both() {
            self.storage
                .create_collection(name, self.config.vector_size)
                .await?;
        }
        Ok(())
    }

    /// Delete, process and store one file, counting it as processed on success.
    async fn reindex_one(&mut self, relative: &str, progress: &mut IndexingProgress) -> Result<()> {
        let collection = self.collections.for_path(relative).to_owned();
        self.storage.delete_file_points(&collection, relative).await?;

        let docs = self.process_file(relative, progress).await?;
        let batch_size = self.config.storage_batch_size.max(1);
        for batch in docs.chunks(batch_size) {
            let ids = self.storage.insert_points_batch(&collection, batch).await?;
            progress.chunks_indexed += ids.len();
            tracing::debug!(collection = %collection, stored = ids.len(), "batch stored");
            self.notify(progress);
        }

        progress.files_processed += 1;
        tracing::info!(file = %relative, chunks = docs.len(), "file indexed");
        self.notify(progress);
        Ok(())
    }

    /// Store documents in fixed-size batches. Returns `false` on the first
    /// failed insert; batches stored before it stay counted.
    async fn store_documents(
        &mut self,
        collection: &str,
        docs: &[Document],
        progress: &mut IndexingProgress,
    ) -> bool {
        let batch_size = self.config.storage_batch_size.max(1);
        for batch in docs.chunks(batch_size) {
            match self.storage.insert_points_batch(collection, batch).await {
                Ok(ids) => {
                    progress.chunks_indexed += ids.len();
                    tracing::debug!(collection, stored = ids.len(), "batch stored");
                    self.notify(progress);
                }
                Err(e) => {
                    progress.errors += 1;
                    tracing::error!(collection, "storage batch failed, stopping: {e}");
                    return false;
                }
            }
        }
        true
    }

    /// Chunk, contextualize and embed one file into documents.
    async fn process_file(
        &mut self,
        relative: &str,
        progress: &mut IndexingProgress,
    ) -> Result<Vec<Document>> {
        let path = absolute_path(self.tracker.root(), relative);
        let chunks = self.chunker.chunk_file(&path)?;
        if chunks.is_empty() {
            tracing::debug!(file = %relative, "no chunks, skipping");
            return Ok(Vec::new());
        }
        progress.chunks_total += chunks.len();

        let contexts = self.contexts_for(&chunks, relative).await;
        for context in &contexts {
            progress.add_context_cost(context.cost_usd);
        }

        let views: Vec<TextViews> = chunks
            .iter()
            .zip(&contexts)
            .map(|(chunk, ctx)| TextViews::new(relative, chunk, &ctx.context))
            .collect();
        let content: Vec<String> = views.iter().map(|v| v.content.clone()).collect();
        let titles: Vec<String> = views.iter().map(|v| v.title.clone()).collect();
        let breadcrumbs: Vec<String> = views.iter().map(|v| v.breadcrumb.clone()).collect();

        let content_vectors = self.embed_view(&content, progress).await?;
        let title_vectors = self.embed_view(&titles, progress).await?;
        let breadcrumb_vectors = self.embed_view(&breadcrumbs, progress).await?;

        Ok(chunks
            .iter()
            .zip(contexts)
            .zip(content_vectors.into_iter().zip(title_vectors).zip(breadcrumb_vectors))
            .map(|((chunk, ctx), ((content, title), breadcrumb))| {
                Document::assemble(
                    &self.workspace_id,
                    relative,
                    chunk,
                    ctx.context,
                    [content, title, breadcrumb],
                )
            })
            .collect())
    }

    async fn embed_view(
        &mut self,
        texts: &[String],
        progress: &mut IndexingProgress,
    ) -> Result<Vec<Vec<f32>>> {
        let responses = self
            .embedder
            .embed_batch(texts, self.config.model, InputType::Document, true)
            .await?;
        Ok(responses
            .into_iter()
            .map(|r| {
                progress.add_embedding_cost(r.cost_usd);
                r.vector
            })
            .collect())
    }

    /// Contexts in chunk order. A failed batch degrades to fallback strings.
    async fn contexts_for(&self, chunks: &[Chunk], relative: &str) -> Vec<ChunkContext> {
        let fallback = |batch: &[Chunk]| {
            batch
                .iter()
                .map(|c| ChunkContext::free(fallback_context(relative, c)))
                .collect::<Vec<_>>()
        };
        let Some(contextualizer) = &self.contextualizer else {
            return fallback(chunks);
        };

        let mut contexts = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.config.context_batch_size.max(1)) {
            match contextualizer.generate_contexts_batch(batch, relative).await {
                Ok(out) if out.len() == batch.len() => contexts.extend(out),
                Ok(out) => {
                    tracing::warn!(
                        file = %relative,
                        expected = batch.len(),
                        got = out.len(),
                        "context count mismatch, using fallback"
                    );
                    // Keep what the contextualizer already spent.
                    let spent: f64 = out.iter().map(|c| c.cost_usd).sum();
                    #[allow(clippy::cast_precision_loss)]
                    let spent_each = spent / batch.len() as f64;
                    contexts.extend(fallback(batch).into_iter().map(|mut c| {
                        c.cost_usd = spent_each;
                        c
                    }));
                }
                Err(e) => {
                    tracing::warn!(file = %relative, "context generation failed, using fallback: {e}");
                    contexts.extend(fallback(batch));
                }
            }
        }
        contexts
    }

    fn notify(&mut self, progress: &IndexingProgress) {
        if let Some(callback) = self.on_progress.as_mut() {
            callback(progress);
        }
    }
}
