//! Source chunking: tree-sitter structural extraction with a line-based fallback.

mod complexity;
mod line;
mod structural;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::languages::{Lang, language_for};

pub use line::LineChunker;
pub use structural::StructuralChunker;

/// What a chunk represents in its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Function,
    Class,
    Method,
    Block,
    File,
}

impl ChunkKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Block => "block",
            Self::File => "file",
        }
    }
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One slice of a source file. Lines are 0-based and inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub kind: ChunkKind,
    pub language: Lang,
    pub symbol_name: Option<String>,
    pub parent_symbol: Option<String>,
    /// Always within `0.0..=1.0`.
    pub complexity: f64,
    pub token_estimate: usize,
}

impl Chunk {
    #[must_use]
    pub fn new(
        content: String,
        start_line: usize,
        end_line: usize,
        kind: ChunkKind,
        language: Lang,
    ) -> Self {
        let token_estimate = estimate_tokens(&content);
        Self {
            content,
            start_line,
            end_line,
            kind,
            language,
            symbol_name: None,
            parent_symbol: None,
            complexity: 0.0,
            token_estimate,
        }
    }

    #[must_use]
    pub fn with_symbol(mut self, symbol_name: Option<String>) -> Self {
        self.symbol_name = symbol_name;
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent_symbol: Option<String>) -> Self {
        self.parent_symbol = parent_symbol;
        self
    }

    #[must_use]
    pub fn with_complexity(mut self, complexity: f64) -> Self {
        self.complexity = complexity.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_token_estimate(mut self, tokens: usize) -> Self {
        self.token_estimate = tokens;
        self
    }

    /// Number of source lines covered.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }
}

/// `max(1, chars / 4)`.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}

/// Chunk budget for the line fallback, in estimated tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub target_tokens: usize,
    pub max_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_tokens: 512,
            max_tokens: 1024,
        }
    }
}

/// A strategy for splitting one file's text into chunks.
pub trait Chunker {
    /// # Errors
    ///
    /// Returns an error if the strategy cannot handle this source.
    fn chunk(&self, source: &str) -> Result<Vec<Chunk>>;
}

/// Picks the chunking strategy per language and degrades to lines on failure.
#[derive(Debug, Clone, Default)]
pub struct FileChunker {
    config: ChunkerConfig,
}

impl FileChunker {
    #[must_use]
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// Read and chunk a file, detecting its language from the extension.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file cannot be read.
    pub fn chunk_file(&self, path: &Path) -> Result<Vec<Chunk>> {
        let source = std::fs::read_to_string(path)?;
        Ok(self.chunk_source(&source, language_for(path)))
    }

    /// Chunk already-loaded source. Structural failures fall back to lines.
    #[must_use]
    pub fn chunk_source(&self, source: &str, lang: Lang) -> Vec<Chunk> {
        if source.trim().is_empty() {
            return Vec::new();
        }

        let line_chunker = LineChunker::new(lang, self.config);
        let Some(structural) = StructuralChunker::new(lang) else {
            return line_chunker.chunk_lines(source);
        };

        match structural.chunk(source) {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(language = %lang, "structural chunking unavailable, using lines: {e}");
                line_chunker.chunk_lines(source)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_floor_is_one() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn chunk_new_derives_token_estimate() {
        let chunk = Chunk::new("x".repeat(40), 0, 0, ChunkKind::Block, Lang::Text);
        assert_eq!(chunk.token_estimate, 10);
        let chunk = chunk.with_token_estimate(3);
        assert_eq!(chunk.token_estimate, 3);
    }

    #[test]
    fn complexity_is_clamped() {
        let chunk = Chunk::new("x".into(), 0, 0, ChunkKind::Block, Lang::Text).with_complexity(1.7);
        assert!((chunk.complexity - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn whitespace_source_yields_nothing() {
        let chunker = FileChunker::default();
        assert!(chunker.chunk_source("  \n\n\t\n", Lang::Python).is_empty());
        assert!(chunker.chunk_source("", Lang::Text).is_empty());
    }

    #[test]
    fn no_grammar_uses_line_fallback() {
        let chunker = FileChunker::default();
        let chunks = chunker.chunk_source("# Title\n\nSome prose.\n", Lang::Markdown);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Block);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (0, 2));
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn grammar_languages_use_structure() {
        let chunker = FileChunker::default();
        let chunks = chunker.chunk_source("def f():\n    return 1\n", Lang::Python);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Function);
        assert_eq!(chunks[0].symbol_name.as_deref(), Some("f"));
    }

    #[test]
    fn chunk_file_reads_and_detects_language() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "line one\nline two\n").unwrap();

        let chunks = FileChunker::default().chunk_file(&path).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].language, Lang::Markdown);
    }

    #[test]
    fn chunk_file_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(
            FileChunker::default()
                .chunk_file(&dir.path().join("absent.rs"))
                .is_err()
        );
    }
}
