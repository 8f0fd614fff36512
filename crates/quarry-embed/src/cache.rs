//! In-process embedding cache with time-based expiry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::model::{EmbeddingModel, InputType};

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Stable cache key for one embedding input.
///
/// Pure function of `(model, input_type, text)`: no salt, no timestamp.
#[must_use]
pub fn cache_key(model: EmbeddingModel, input_type: InputType, text: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(model.api_name().as_bytes());
    hasher.update(&[0]);
    hasher.update(input_type.as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(text.as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[derive(Debug, Clone)]
pub struct CachedEmbedding {
    pub vector: Vec<f32>,
    pub model: EmbeddingModel,
    pub token_count: u64,
    stored_at: Instant,
}

/// Embedding cache owned by a single `EmbeddingClient`.
pub struct EmbeddingCache {
    entries: HashMap<String, CachedEmbedding>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl EmbeddingCache {
    #[must_use]
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            clock,
        }
    }

    /// Look up a live entry. An expired entry is removed and reported as a miss.
    pub fn get(&mut self, key: &str) -> Option<&CachedEmbedding> {
        let now = self.clock.now();
        let expired = self
            .entries
            .get(key)
            .is_some_and(|e| now.saturating_duration_since(e.stored_at) >= self.ttl);
        if expired {
            tracing::debug!(key, "embedding cache entry expired");
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key)
    }

    pub fn insert(
        &mut self,
        key: String,
        vector: Vec<f32>,
        model: EmbeddingModel,
        token_count: u64,
    ) {
        let entry = CachedEmbedding {
            vector,
            model,
            token_count,
            stored_at: self.clock.now(),
        };
        self.entries.insert(key, entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
