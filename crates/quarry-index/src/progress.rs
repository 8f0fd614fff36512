use std::fmt;

use serde::Serialize;

/// Stage of an indexing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingPhase {
    #[default]
    Discovering,
    EnsuringStorage,
    Processing,
    Storing,
    Complete,
}

/// Counters for one indexing run. Every counter only grows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndexingProgress {
    pub phase: IndexingPhase,
    pub files_total: usize,
    pub files_processed: usize,
    pub chunks_total: usize,
    pub chunks_indexed: usize,
    pub errors: usize,
    pub context_cost_usd: f64,
    pub embedding_cost_usd: f64,
    /// `context_cost_usd + embedding_cost_usd`.
    pub cost_usd: f64,
}

/// How a finished run turned out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Partial,
    NothingIndexed,
}

impl IndexingProgress {
    pub fn add_context_cost(&mut self, usd: f64) {
        self.context_cost_usd += usd;
        self.cost_usd += usd;
    }

    pub fn add_embedding_cost(&mut self, usd: f64) {
        self.embedding_cost_usd += usd;
        self.cost_usd += usd;
    }

    #[must_use]
    pub fn outcome(&self) -> RunOutcome {
        if self.chunks_indexed == 0 && (self.chunks_total > 0 || self.errors > 0) {
            RunOutcome::NothingIndexed
        } else if self.errors > 0 {
            RunOutcome::Partial
        } else {
            RunOutcome::Succeeded
        }
    }
}

impl fmt::Display for IndexingProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} files, {}/{} chunks indexed, {} errors, ${:.6}",
            self.files_processed,
            self.files_total,
            self.chunks_indexed,
            self.chunks_total,
            self.errors,
            self.cost_usd
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn costs_sum_into_total() {
        let mut progress = IndexingProgress::default();
        progress.add_context_cost(0.25);
        progress.add_embedding_cost(0.5);
        progress.add_embedding_cost(0.25);
        assert!((progress.cost_usd - 1.0).abs() < 1e-12);
        assert!((progress.embedding_cost_usd - 0.75).abs() < 1e-12);
    }

    #[test]
    fn outcomes() {
        let mut progress = IndexingProgress::default();
        assert_eq!(progress.outcome(), RunOutcome::Succeeded);

        progress.errors = 1;
        assert_eq!(progress.outcome(), RunOutcome::NothingIndexed);

        progress.chunks_total = 4;
        progress.errors = 0;
        assert_eq!(progress.outcome(), RunOutcome::NothingIndexed);

        progress.chunks_indexed = 3;
        progress.errors = 1;
        assert_eq!(progress.outcome(), RunOutcome::Partial);
    }

    #[test]
    fn display_summary() {
        let progress = IndexingProgress {
            files_total: 3,
            files_processed: 3,
            chunks_total: 10,
            chunks_indexed: 10,
            cost_usd: 0.0012,
            ..IndexingProgress::default()
        };
        assert_eq!(
            progress.to_string(),
            "3/3 files, 10/10 chunks indexed, 0 errors, $0.001200"
        );
    }
}
