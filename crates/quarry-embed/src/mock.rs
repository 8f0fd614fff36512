//! Test-only deterministic embedding provider.

use std::sync::{Arc, Mutex};

use crate::error::{EmbedError, Result};
use crate::model::{EmbeddingModel, InputType};
use crate::provider::{EmbeddingProvider, ProviderEmbeddings};

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    pub texts: Vec<String>,
    pub model: EmbeddingModel,
    pub input_type: InputType,
}

#[derive(Debug, Clone)]
pub struct MockProvider {
    calls: Arc<Mutex<Vec<MockCall>>>,
    pub dimension: usize,
    /// Tokens billed per text; the batch total is this times the batch size.
    pub tokens_per_text: u64,
    pub fail: bool,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            dimension: 8,
            tokens_per_text: 10,
            fail: false,
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tokens_per_text(mut self, tokens: u64) -> Self {
        self.tokens_per_text = tokens;
        self
    }

    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Snapshot of every call made so far, shared across clones.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    /// The vector this provider returns for `text`.
    #[must_use]
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let hash = blake3::hash(text.as_bytes());
        hash.as_bytes()
            .iter()
            .cycle()
            .take(self.dimension)
            .map(|b| f32::from(*b) / 255.0)
            .collect()
    }
}

impl EmbeddingProvider for MockProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }

    async fn embed(
        &self,
        texts: &[String],
        model: EmbeddingModel,
        input_type: InputType,
        _truncate: bool,
    ) -> Result<ProviderEmbeddings> {
        if self.fail {
            return Err(EmbedError::Other("mock embedding error".into()));
        }
        self.calls
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(MockCall {
                texts: texts.to_vec(),
                model,
                input_type,
            });
        Ok(ProviderEmbeddings {
            vectors: texts.iter().map(|t| self.vector_for(t)).collect(),
            total_tokens: self.tokens_per_text * u64::try_from(texts.len()).unwrap_or(u64::MAX),
        })
    }
}
