//! Workspace indexing: change tracking, structure-aware chunking and the
//! pipeline that turns chunks into multi-vector documents.
//!
//! Source files are chunked by tree-sitter where a grammar is available and
//! by line windows otherwise. Each chunk gets a short context, three embedded
//! text views (content, title, breadcrumb) and is stored through the
//! [`store::Storage`] contract. Content-hash snapshots let later runs touch
//! only the files that changed.

pub mod chunker;
pub mod contextualizer;
pub mod discovery;
pub mod document;
pub mod error;
pub mod languages;
pub mod pipeline;
pub mod progress;
pub mod store;
pub mod sync;

pub use chunker::{Chunk, ChunkKind, ChunkerConfig, FileChunker};
pub use contextualizer::{ClaudeContextualizer, Contextualizer, FallbackContextualizer};
pub use discovery::PathFilter;
pub use document::Document;
pub use error::{IndexError, Result};
pub use languages::Lang;
pub use pipeline::{CollectionNames, IndexingPipeline, PipelineConfig};
pub use progress::{IndexingPhase, IndexingProgress, RunOutcome};
pub use store::{InMemoryStorage, QdrantStorage, Storage, StorageError};
pub use sync::{ChangeSet, ChangeTracker, WorkspaceSnapshot};
