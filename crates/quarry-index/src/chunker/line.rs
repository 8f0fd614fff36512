//! Fixed-budget line chunking for files without a usable grammar.

use super::complexity::{Metrics, score};
use super::{Chunk, ChunkKind, Chunker, ChunkerConfig, estimate_tokens};
use crate::error::Result;
use crate::languages::Lang;

/// Splits text into contiguous line runs bounded by a token budget.
///
/// Every line lands in exactly one chunk and no line is ever split, so a
/// single line longer than `max_tokens` becomes its own oversized chunk.
#[derive(Debug, Clone)]
pub struct LineChunker {
    lang: Lang,
    config: ChunkerConfig,
}

struct Run {
    text: String,
    start: usize,
    lines: usize,
    tokens: usize,
}

impl LineChunker {
    #[must_use]
    pub fn new(lang: Lang, config: ChunkerConfig) -> Self {
        Self { lang, config }
    }

    #[must_use]
    pub fn chunk_lines(&self, source: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut run = Run {
            text: String::new(),
            start: 0,
            lines: 0,
            tokens: 0,
        };

        for (row, line) in source.split_inclusive('\n').enumerate() {
            let line_tokens = line.chars().count() / 4;

            if run.lines > 0 && run.tokens + line_tokens > self.config.max_tokens {
                chunks.push(self.finish(&mut run, row));
            }

            run.text.push_str(line);
            run.lines += 1;
            run.tokens += line_tokens;

            if run.tokens >= self.config.target_tokens {
                chunks.push(self.finish(&mut run, row + 1));
            }
        }

        if run.lines > 0 {
            let next = run.start + run.lines;
            chunks.push(self.finish(&mut run, next));
        }

        chunks
    }

    /// Close the current run and start the next one at `next_start`.
    fn finish(&self, run: &mut Run, next_start: usize) -> Chunk {
        let text = std::mem::take(&mut run.text);
        let start = run.start;
        let end = start + run.lines - 1;
        let complexity = score(Metrics {
            lines: run.lines,
            ..Metrics::default()
        });

        run.start = next_start;
        run.lines = 0;
        run.tokens = 0;

        let tokens = estimate_tokens(&text);
        Chunk::new(text, start, end, ChunkKind::Block, self.lang)
            .with_complexity(complexity)
            .with_token_estimate(tokens)
    }
}

impl Chunker for LineChunker {
    fn chunk(&self, source: &str) -> Result<Vec<Chunk>> {
        Ok(self.chunk_lines(source))
    }
}
