//! Storage collaborator contract and its Qdrant and in-memory implementations.

mod in_memory;
mod qdrant;

use std::future::Future;
use std::pin::Pin;

use crate::document::Document;

pub use in_memory::InMemoryStorage;
pub use qdrant::QdrantStorage;

/// Named vectors every collection carries.
pub const VECTOR_NAMES: [&str; 3] = ["content", "title", "breadcrumb"];

/// Payload fields that get keyword indexes.
pub const INDEXED_FIELDS: [&str; 3] = ["file_path", "language", "workspace_id"];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("collection error: {0}")]
    Collection(String),
    #[error("insert error: {0}")]
    Insert(String),
    #[error("delete error: {0}")]
    Delete(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub vectors_count: u64,
    pub status: String,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait Storage: Send + Sync {
    /// Create the collection with one cosine vector per name in [`VECTOR_NAMES`].
    /// No-op if it already exists.
    fn create_collection<'a>(
        &'a self,
        collection: &'a str,
        vector_size: u64,
    ) -> BoxFuture<'a, Result<(), StorageError>>;

    /// Delete the collection. No-op if it does not exist.
    fn delete_collection<'a>(&'a self, collection: &'a str)
    -> BoxFuture<'a, Result<(), StorageError>>;

    /// `None` when the collection does not exist.
    fn collection_info<'a>(
        &'a self,
        collection: &'a str,
    ) -> BoxFuture<'a, Result<Option<CollectionInfo>, StorageError>>;

    /// Upsert documents, returning their ids in input order.
    fn insert_points_batch<'a>(
        &'a self,
        collection: &'a str,
        documents: &'a [Document],
    ) -> BoxFuture<'a, Result<Vec<String>, StorageError>>;

    /// Remove every point whose payload `file_path` equals `file_path`.
    fn delete_file_points<'a>(
        &'a self,
        collection: &'a str,
        file_path: &'a str,
    ) -> BoxFuture<'a, Result<(), StorageError>>;
}
