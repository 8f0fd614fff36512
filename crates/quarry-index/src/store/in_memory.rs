use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{BoxFuture, CollectionInfo, Storage, StorageError};
use crate::document::Document;

struct Collection {
    vector_size: u64,
    points: Vec<Document>,
}

/// Process-local storage for tests and dry runs.
pub struct InMemoryStorage {
    collections: RwLock<HashMap<String, Collection>>,
    fail_inserts_after: AtomicUsize,
    failing: AtomicBool,
    inserts: AtomicUsize,
}

impl InMemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            fail_inserts_after: AtomicUsize::new(usize::MAX),
            failing: AtomicBool::new(false),
            inserts: AtomicUsize::new(0),
        }
    }

    /// Make every insert after the first `n` successful ones fail.
    pub fn fail_inserts_after(&self, n: usize) {
        self.fail_inserts_after.store(n, Ordering::SeqCst);
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Stored documents of `collection`, in insertion order.
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .map(|cols| {
                cols.get(collection)
                    .map(|c| c.points.clone())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .map(|cols| cols.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStorage").finish_non_exhaustive()
    }
}

fn check_dimensions(doc: &Document, vector_size: u64) -> Result<(), StorageError> {
    let size = usize::try_from(vector_size).unwrap_or(usize::MAX);
    for vector in [&doc.content_vector, &doc.title_vector, &doc.breadcrumb_vector] {
        if vector.len() != size {
            return Err(StorageError::Insert(format!(
                "point {} has dimension {}, collection expects {vector_size}",
                doc.id,
                vector.len()
            )));
        }
    }
    Ok(())
}

impl Storage for InMemoryStorage {
    fn create_collection<'a>(
        &'a self,
        collection: &'a str,
        vector_size: u64,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| StorageError::Collection(e.to_string()))?;
            cols.entry(collection.to_owned())
                .or_insert_with(|| Collection {
                    vector_size,
                    points: Vec::new(),
                });
            Ok(())
        })
    }

    fn delete_collection<'a>(
        &'a self,
        collection: &'a str,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| StorageError::Collection(e.to_string()))?;
            cols.remove(collection);
            Ok(())
        })
    }

    fn collection_info<'a>(
        &'a self,
        collection: &'a str,
    ) -> BoxFuture<'a, Result<Option<CollectionInfo>, StorageError>> {
        Box::pin(async move {
            let cols = self
                .collections
                .read()
                .map_err(|e| StorageError::Collection(e.to_string()))?;
            Ok(cols.get(collection).map(|c| CollectionInfo {
                name: collection.to_owned(),
                vectors_count: c.points.len() as u64,
                status: "green".into(),
            }))
        })
    }

    fn insert_points_batch<'a>(
        &'a self,
        collection: &'a str,
        documents: &'a [Document],
    ) -> BoxFuture<'a, Result<Vec<String>, StorageError>> {
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst)
                && self.inserts.load(Ordering::SeqCst)
                    >= self.fail_inserts_after.load(Ordering::SeqCst)
            {
                return Err(StorageError::Insert("injected insert failure".into()));
            }

            let mut cols = self
                .collections
                .write()
                .map_err(|e| StorageError::Insert(e.to_string()))?;
            let col = cols.get_mut(collection).ok_or_else(|| {
                StorageError::Insert(format!("collection {collection} not found"))
            })?;

            for doc in documents {
                check_dimensions(doc, col.vector_size)?;
            }
            for doc in documents {
                match col.points.iter_mut().find(|p| p.id == doc.id) {
                    Some(existing) => *existing = doc.clone(),
                    None => col.points.push(doc.clone()),
                }
            }

            self.inserts.fetch_add(1, Ordering::SeqCst);
            Ok(documents.iter().map(|d| d.id.clone()).collect())
        })
    }

    fn delete_file_points<'a>(
        &'a self,
        collection: &'a str,
        file_path: &'a str,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let mut cols = self
                .collections
                .write()
                .map_err(|e| StorageError::Delete(e.to_string()))?;
            if let Some(col) = cols.get_mut(collection) {
                col.points.retain(|p| p.payload.file_path != file_path);
            }
            Ok(())
        })
    }
}
