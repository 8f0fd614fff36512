use std::fmt;

/// Running usage totals for one `EmbeddingClient`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostLedger {
    pub requests: u64,
    pub tokens: u64,
    pub cost_usd: f64,
    pub cache_hits: u64,
}

impl CostLedger {
    pub fn record_hit(&mut self) {
        self.requests += 1;
        self.cache_hits += 1;
    }

    pub fn record_usage(&mut self, tokens: u64, cost_usd: f64) {
        self.requests += 1;
        self.tokens += tokens;
        self.cost_usd += cost_usd;
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cache_hit_rate(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / self.requests as f64
    }
}

impl fmt::Display for CostLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} requests, {} tokens, ${:.6}, cache hit rate {:.1}%",
            self.requests,
            self.tokens,
            self.cost_usd,
            self.cache_hit_rate() * 100.0
        )
    }
}
