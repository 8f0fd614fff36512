use std::collections::HashMap;

use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    CollectionStatus, Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, PointStruct, UpsertPointsBuilder,
    VectorParamsBuilder, VectorsConfigBuilder,
};

use super::{BoxFuture, CollectionInfo, INDEXED_FIELDS, Storage, StorageError, VECTOR_NAMES};
use crate::document::Document;

/// Qdrant-backed storage with three named vectors per point.
#[derive(Clone)]
pub struct QdrantStorage {
    client: Qdrant,
}

impl std::fmt::Debug for QdrantStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantStorage").finish_non_exhaustive()
    }
}

impl QdrantStorage {
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the client cannot be built.
    pub fn new(url: &str) -> Result<Self, StorageError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(Self { client })
    }

    async fn ensure_collection(
        &self,
        collection: &str,
        vector_size: u64,
    ) -> Result<(), StorageError> {
        let exists = self
            .client
            .collection_exists(collection)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if exists {
            return Ok(());
        }

        let mut vectors = VectorsConfigBuilder::default();
        for name in VECTOR_NAMES {
            vectors.add_named_vector_params(
                name,
                VectorParamsBuilder::new(vector_size, Distance::Cosine),
            );
        }
        self.client
            .create_collection(CreateCollectionBuilder::new(collection).vectors_config(vectors))
            .await
            .map_err(|e| StorageError::Collection(e.to_string()))?;

        for field in INDEXED_FIELDS {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    collection,
                    field,
                    FieldType::Keyword,
                ))
                .await
                .map_err(|e| StorageError::Collection(e.to_string()))?;
        }

        tracing::info!(collection, vector_size, "created collection");
        Ok(())
    }
}

fn to_point(doc: &Document) -> Result<PointStruct, StorageError> {
    let payload: HashMap<String, qdrant_client::qdrant::Value> =
        serde_json::to_value(&doc.payload)
            .and_then(serde_json::from_value)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

    let vectors: HashMap<String, Vec<f32>> = VECTOR_NAMES
        .iter()
        .map(|n| (*n).to_owned())
        .zip([
            doc.content_vector.clone(),
            doc.title_vector.clone(),
            doc.breadcrumb_vector.clone(),
        ])
        .collect();

    Ok(PointStruct::new(doc.id.clone(), vectors, payload))
}

impl Storage for QdrantStorage {
    fn create_collection<'a>(
        &'a self,
        collection: &'a str,
        vector_size: u64,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(self.ensure_collection(collection, vector_size))
    }

    fn delete_collection<'a>(
        &'a self,
        collection: &'a str,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(collection)
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            if exists {
                self.client
                    .delete_collection(collection)
                    .await
                    .map_err(|e| StorageError::Collection(e.to_string()))?;
            }
            Ok(())
        })
    }

    fn collection_info<'a>(
        &'a self,
        collection: &'a str,
    ) -> BoxFuture<'a, Result<Option<CollectionInfo>, StorageError>> {
        Box::pin(async move {
            let exists = self
                .client
                .collection_exists(collection)
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            if !exists {
                return Ok(None);
            }
            let response = self
                .client
                .collection_info(collection)
                .await
                .map_err(|e| StorageError::Collection(e.to_string()))?;
            Ok(response.result.map(|info| CollectionInfo {
                name: collection.to_owned(),
                vectors_count: info.points_count.unwrap_or(0),
                status: CollectionStatus::try_from(info.status)
                    .map_or_else(|_| "unknown".to_owned(), |s| s.as_str_name().to_lowercase()),
            }))
        })
    }

    fn insert_points_batch<'a>(
        &'a self,
        collection: &'a str,
        documents: &'a [Document],
    ) -> BoxFuture<'a, Result<Vec<String>, StorageError>> {
        Box::pin(async move {
            if documents.is_empty() {
                return Ok(Vec::new());
            }
            let points = documents
                .iter()
                .map(to_point)
                .collect::<Result<Vec<_>, _>>()?;
            self.client
                .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
                .await
                .map_err(|e| StorageError::Insert(e.to_string()))?;
            Ok(documents.iter().map(|d| d.id.clone()).collect())
        })
    }

    fn delete_file_points<'a>(
        &'a self,
        collection: &'a str,
        file_path: &'a str,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        Box::pin(async move {
            self.client
                .delete_points(
                    DeletePointsBuilder::new(collection)
                        .points(Filter::must([Condition::matches(
                            "file_path",
                            file_path.to_owned(),
                        )]))
                        .wait(true),
                )
                .await
                .map_err(|e| StorageError::Delete(e.to_string()))?;
            Ok(())
        })
    }
}
