//! Multi-vector documents assembled from chunks, ready for storage.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::chunker::{Chunk, ChunkKind};
use crate::languages::Lang;

/// Metadata stored alongside the three vectors of one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub file_path: String,
    pub symbol_name: Option<String>,
    pub parent_symbol: Option<String>,
    pub kind: ChunkKind,
    pub language: Lang,
    pub raw_code: String,
    pub context_snippet: String,
    pub start_line: usize,
    pub end_line: usize,
    pub complexity: f64,
    pub workspace_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub content_vector: Vec<f32>,
    pub title_vector: Vec<f32>,
    pub breadcrumb_vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// The three texts embedded for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextViews {
    pub content: String,
    pub title: String,
    pub breadcrumb: String,
}

impl TextViews {
    #[must_use]
    pub fn new(file_path: &str, chunk: &Chunk, context: &str) -> Self {
        let content = if context.is_empty() {
            chunk.content.clone()
        } else {
            format!("{context}\n\n{}", chunk.content)
        };
        let title = chunk
            .symbol_name
            .clone()
            .unwrap_or_else(|| format!("{}_{}", chunk.kind, chunk.start_line));
        let breadcrumb = match &chunk.symbol_name {
            Some(symbol) => format!("{file_path}.{symbol}"),
            None => format!("{file_path}:{}", chunk.start_line),
        };
        Self {
            content,
            title,
            breadcrumb,
        }
    }
}

/// Deterministic id so re-indexing a chunk overwrites instead of duplicating.
///
/// A container and its member can span the same lines (`impl X { fn f() {} }`),
/// so kind, symbol and a content digest are part of the name.
#[must_use]
pub fn point_id(workspace_id: &str, file_path: &str, chunk: &Chunk) -> String {
    let digest = hex::encode(Sha256::digest(chunk.content.as_bytes()));
    let name = format!(
        "{workspace_id}:{file_path}:{}:{}:{}:{}:{}:{digest}",
        chunk.start_line,
        chunk.end_line,
        chunk.kind,
        chunk.parent_symbol.as_deref().unwrap_or_default(),
        chunk.symbol_name.as_deref().unwrap_or_default(),
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

impl Document {
    #[must_use]
    pub fn assemble(
        workspace_id: &str,
        file_path: &str,
        chunk: &Chunk,
        context: String,
        vectors: [Vec<f32>; 3],
    ) -> Self {
        let [content_vector, title_vector, breadcrumb_vector] = vectors;
        Self {
            id: point_id(workspace_id, file_path, chunk),
            content_vector,
            title_vector,
            breadcrumb_vector,
            payload: ChunkPayload {
                file_path: file_path.to_owned(),
                symbol_name: chunk.symbol_name.clone(),
                parent_symbol: chunk.parent_symbol.clone(),
                kind: chunk.kind,
                language: chunk.language,
                raw_code: chunk.content.clone(),
                context_snippet: context,
                start_line: chunk.start_line,
                end_line: chunk.end_line,
                complexity: chunk.complexity,
                workspace_id: workspace_id.to_owned(),
            },
        }
    }
}
