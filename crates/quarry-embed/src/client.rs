//! Caching, rate-limited, cost-accounted front end over an [`EmbeddingProvider`].

use crate::batch::{apportion_tokens, split_batches};
use crate::cache::{CachedEmbedding, EmbeddingCache, cache_key};
use crate::error::{EmbedError, Result};
use crate::ledger::CostLedger;
use crate::model::{EmbeddingModel, InputType, PriceTable};
use crate::provider::EmbeddingProvider;
use crate::rate_limit::RateLimiter;

pub const DEFAULT_MAX_BATCH_SIZE: usize = 128;

/// One text to embed together with the options that affect its vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingRequest {
    pub text: String,
    pub model: EmbeddingModel,
    pub input_type: InputType,
    pub truncate: bool,
}

impl EmbeddingRequest {
    #[must_use]
    pub fn new(text: impl Into<String>, model: EmbeddingModel, input_type: InputType) -> Self {
        Self {
            text: text.into(),
            model,
            input_type,
            truncate: true,
        }
    }

    #[must_use]
    pub fn cache_key(&self) -> String {
        cache_key(self.model, self.input_type, &self.text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResponse {
    pub vector: Vec<f32>,
    pub model: EmbeddingModel,
    pub token_count: u64,
    pub from_cache: bool,
    /// Always zero when `from_cache` is set.
    pub cost_usd: f64,
}

impl EmbeddingResponse {
    fn cached(entry: &CachedEmbedding) -> Self {
        Self {
            vector: entry.vector.clone(),
            model: entry.model,
            token_count: entry.token_count,
            from_cache: true,
            cost_usd: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound on texts per provider request.
    pub max_batch_size: usize,
    pub prices: PriceTable,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            prices: PriceTable::default(),
        }
    }
}

/// Embedding client owning its cache, rate limiter and cost ledger.
pub struct EmbeddingClient<P> {
    provider: P,
    cache: EmbeddingCache,
    limiter: RateLimiter,
    ledger: CostLedger,
    config: ClientConfig,
}

impl<P> std::fmt::Debug for EmbeddingClient<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("cache", &self.cache)
            .field("limiter", &self.limiter)
            .field("ledger", &self.ledger)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<P: EmbeddingProvider> EmbeddingClient<P> {
    #[must_use]
    pub fn new(
        provider: P,
        cache: EmbeddingCache,
        limiter: RateLimiter,
        config: ClientConfig,
    ) -> Self {
        Self {
            provider,
            cache,
            limiter,
            ledger: CostLedger::default(),
            config,
        }
    }

    /// Embed one text, serving it from the cache when a live entry exists.
    ///
    /// # Errors
    ///
    /// Returns the provider error when the text is not cached and the remote call fails.
    pub async fn embed(
        &mut self,
        text: &str,
        model: EmbeddingModel,
        input_type: InputType,
        truncate: bool,
    ) -> Result<EmbeddingResponse> {
        let texts = [text.to_owned()];
        self.embed_batch(&texts, model, input_type, truncate)
            .await?
            .pop()
            .ok_or(EmbedError::EmptyResponse {
                provider: "embedding client",
            })
    }

    /// Embed a request built with [`EmbeddingRequest::new`].
    ///
    /// # Errors
    ///
    /// See [`EmbeddingClient::embed`].
    pub async fn embed_request(&mut self, request: &EmbeddingRequest) -> Result<EmbeddingResponse> {
        self.embed(
            &request.text,
            request.model,
            request.input_type,
            request.truncate,
        )
        .await
    }

    /// Embed many texts, returning one response per input in input order.
    ///
    /// Only cache misses reach the provider, in sub-batches of at most
    /// `max_batch_size`. Each sub-batch takes one rate-limit slot and its billed
    /// tokens are split evenly across its texts.
    ///
    /// # Errors
    ///
    /// Returns the first provider error. Sub-batches completed before the
    /// failure stay cached and accounted.
    #[allow(clippy::cast_precision_loss)]
    pub async fn embed_batch(
        &mut self,
        texts: &[String],
        model: EmbeddingModel,
        input_type: InputType,
        truncate: bool,
    ) -> Result<Vec<EmbeddingResponse>> {
        let mut results: Vec<Option<EmbeddingResponse>> = vec![None; texts.len()];
        let mut pending: Vec<(usize, String)> = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let key = cache_key(model, input_type, text);
            if let Some(entry) = self.cache.get(&key) {
                results[i] = Some(EmbeddingResponse::cached(entry));
                self.ledger.record_hit();
            } else {
                pending.push((i, key));
            }
        }

        if !pending.is_empty() {
            tracing::debug!(
                total = texts.len(),
                cached = texts.len() - pending.len(),
                model = %model,
                "embedding cache misses"
            );
        }

        for batch in split_batches(&pending, self.config.max_batch_size) {
            let batch_texts: Vec<String> = batch.iter().map(|(i, _)| texts[*i].clone()).collect();

            self.limiter.acquire().await;
            let out = self
                .provider
                .embed(&batch_texts, model, input_type, truncate)
                .await?;

            if out.vectors.len() != batch.len() {
                return Err(EmbedError::CountMismatch {
                    expected: batch.len(),
                    actual: out.vectors.len(),
                });
            }

            let shares = apportion_tokens(out.total_tokens, batch.len());
            let cost_each = self
                .config
                .prices
                .cost(model, out.total_tokens as f64 / batch.len() as f64);

            for (((i, key), vector), tokens) in batch.iter().zip(out.vectors).zip(shares) {
                self.cache.insert(key.clone(), vector.clone(), model, tokens);
                self.ledger.record_usage(tokens, cost_each);
                results[*i] = Some(EmbeddingResponse {
                    vector,
                    model,
                    token_count: tokens,
                    from_cache: false,
                    cost_usd: cost_each,
                });
            }
        }

        Ok(results.into_iter().flatten().collect())
    }

    #[must_use]
    pub fn ledger(&self) -> &CostLedger {
        &self.ledger
    }

    #[must_use]
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::cache::DEFAULT_TTL;
    use crate::clock::ManualClock;
    use crate::mock::MockProvider;

    fn client_with(
        provider: MockProvider,
        max_batch_size: usize,
        rpm: usize,
    ) -> (EmbeddingClient<MockProvider>, ManualClock) {
        let clock = ManualClock::new();
        let shared: Arc<dyn crate::clock::Clock> = Arc::new(clock.clone());
        let client = EmbeddingClient::new(
            provider,
            EmbeddingCache::new(DEFAULT_TTL, Arc::clone(&shared)),
            RateLimiter::new(rpm, shared),
            ClientConfig {
                max_batch_size,
                ..ClientConfig::default()
            },
        );
        (client, clock)
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[tokio::test]
    async fn second_embed_is_cache_hit() {
        let provider = MockProvider::default();
        let (mut client, _clock) = client_with(provider.clone(), 128, 60);

        let first = client
            .embed("def f(): pass", EmbeddingModel::Code, InputType::Document, true)
            .await
            .unwrap();
        assert!(!first.from_cache);
        assert!(first.cost_usd > 0.0);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(client.cache().len(), 1);

        let second = client
            .embed("def f(): pass", EmbeddingModel::Code, InputType::Document, true)
            .await
            .unwrap();
        assert!(second.from_cache);
        assert!(second.cost_usd.abs() < f64::EPSILON);
        assert_eq!(second.vector, first.vector);
        assert_eq!(provider.call_count(), 1);

        let ledger = client.ledger();
        assert_eq!(ledger.requests, 2);
        assert_eq!(ledger.cache_hits, 1);
    }

    #[tokio::test]
    async fn input_type_is_part_of_the_key() {
        let provider = MockProvider::default();
        let (mut client, _clock) = client_with(provider.clone(), 128, 60);

        client
            .embed("x", EmbeddingModel::Code, InputType::Document, true)
            .await
            .unwrap();
        let query = client
            .embed("x", EmbeddingModel::Code, InputType::Query, true)
            .await
            .unwrap();

        assert!(!query.from_cache);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn batch_sends_only_misses_and_preserves_order() {
        let provider = MockProvider::default();
        let (mut client, _clock) = client_with(provider.clone(), 128, 60);

        client
            .embed("b", EmbeddingModel::Code, InputType::Document, true)
            .await
            .unwrap();

        let out = client
            .embed_batch(
                &texts(&["a", "b", "c"]),
                EmbeddingModel::Code,
                InputType::Document,
                true,
            )
            .await
            .unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].vector, provider.vector_for("a"));
        assert_eq!(out[1].vector, provider.vector_for("b"));
        assert_eq!(out[2].vector, provider.vector_for("c"));
        assert!(out[1].from_cache);
        assert!(!out[0].from_cache && !out[2].from_cache);

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].texts, texts(&["a", "c"]));
    }

    #[tokio::test]
    async fn batch_results_are_cached_individually() {
        let provider = MockProvider::default();
        let (mut client, _clock) = client_with(provider.clone(), 128, 60);

        client
            .embed_batch(
                &texts(&["one", "two"]),
                EmbeddingModel::Code,
                InputType::Document,
                true,
            )
            .await
            .unwrap();
        let single = client
            .embed("two", EmbeddingModel::Code, InputType::Document, true)
            .await
            .unwrap();

        assert!(single.from_cache);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn misses_are_split_into_sub_batches() {
        let provider = MockProvider::default();
        let (mut client, _clock) = client_with(provider.clone(), 2, 60);

        let input = texts(&["1", "2", "3", "4", "5"]);
        let out = client
            .embed_batch(&input, EmbeddingModel::Fast, InputType::Document, true)
            .await
            .unwrap();

        assert_eq!(out.len(), 5);
        let sizes: Vec<usize> = provider.calls().iter().map(|c| c.texts.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(client.limiter.in_window(), 3);
    }

    #[tokio::test]
    async fn batch_cost_is_conserved() {
        for n in [1usize, 2, 3, 7, 10] {
            let provider = MockProvider::default().with_tokens_per_text(13);
            let (mut client, _clock) = client_with(provider, 4, 600);
            let input: Vec<String> = (0..n).map(|i| format!("text {i}")).collect();

            let out = client
                .embed_batch(&input, EmbeddingModel::Code, InputType::Document, true)
                .await
                .unwrap();

            let total_tokens = 13 * n as u64;
            let expected = total_tokens as f64 / 1_000_000.0 * 0.18;
            let sum: f64 = out.iter().map(|r| r.cost_usd).sum();
            assert!((sum - expected).abs() < 1e-12, "n={n}: {sum} != {expected}");
            assert_eq!(out.iter().map(|r| r.token_count).sum::<u64>(), total_tokens);
            assert_eq!(client.ledger().tokens, total_tokens);
        }
    }

    #[tokio::test]
    async fn uneven_batch_tokens_split_equally() {
        let provider = MockProvider::default().with_tokens_per_text(5);
        let (mut client, _clock) = client_with(provider, 128, 60);

        let out = client
            .embed_batch(
                &texts(&["short", "a much longer piece of text"]),
                EmbeddingModel::Code,
                InputType::Document,
                true,
            )
            .await
            .unwrap();

        assert!((out[0].cost_usd - out[1].cost_usd).abs() < f64::EPSILON);
        assert_eq!(out[0].token_count, 5);
        assert_eq!(out[1].token_count, 5);
    }

    #[tokio::test]
    async fn expired_entry_triggers_new_call() {
        let provider = MockProvider::default();
        let (mut client, clock) = client_with(provider.clone(), 128, 60);

        client
            .embed("x", EmbeddingModel::Code, InputType::Document, true)
            .await
            .unwrap();
        clock.advance(DEFAULT_TTL + Duration::from_secs(1));
        let again = client
            .embed("x", EmbeddingModel::Code, InputType::Document, true)
            .await
            .unwrap();

        assert!(!again.from_cache);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn cache_hit_does_not_consume_rate_limit() {
        let provider = MockProvider::default();
        let (mut client, clock) = client_with(provider, 128, 1);

        client
            .embed("x", EmbeddingModel::Code, InputType::Document, true)
            .await
            .unwrap();
        client
            .embed("x", EmbeddingModel::Code, InputType::Document, true)
            .await
            .unwrap();

        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn rate_limit_waits_between_sends() {
        let provider = MockProvider::default();
        let (mut client, clock) = client_with(provider, 128, 1);

        client
            .embed("x", EmbeddingModel::Code, InputType::Document, true)
            .await
            .unwrap();
        client
            .embed("y", EmbeddingModel::Code, InputType::Document, true)
            .await
            .unwrap();

        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60)]);
    }

    #[tokio::test]
    async fn failure_propagates_and_is_not_cached() {
        let (mut client, _clock) = client_with(MockProvider::failing(), 128, 60);

        let result = client
            .embed("x", EmbeddingModel::Code, InputType::Document, true)
            .await;

        assert!(result.is_err());
        assert!(client.cache().is_empty());
        assert_eq!(*client.ledger(), CostLedger::default());
    }

    #[tokio::test]
    async fn embed_request_uses_request_fields() {
        let provider = MockProvider::default();
        let (mut client, _clock) = client_with(provider.clone(), 128, 60);
        let request = EmbeddingRequest::new("q", EmbeddingModel::Fast, InputType::Query);

        client.embed_request(&request).await.unwrap();

        let calls = provider.calls();
        assert_eq!(calls[0].model, EmbeddingModel::Fast);
        assert_eq!(calls[0].input_type, InputType::Query);
        assert_eq!(
            request.cache_key(),
            cache_key(EmbeddingModel::Fast, InputType::Query, "q")
        );
    }
}
