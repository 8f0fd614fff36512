//! Embedding model catalogue and per-model pricing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Embedding model family offered by the remote provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingModel {
    /// Cheap general-purpose model.
    Fast,
    /// Model tuned for source code retrieval.
    Code,
    /// Large model with a long input window.
    LongContext,
}

impl EmbeddingModel {
    pub const ALL: [Self; 3] = [Self::Fast, Self::Code, Self::LongContext];

    /// Identifier used in config files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Code => "code",
            Self::LongContext => "long-context",
        }
    }

    /// Model name sent to the provider API.
    #[must_use]
    pub fn api_name(self) -> &'static str {
        match self {
            Self::Fast => "voyage-3.5-lite",
            Self::Code => "voyage-code-3",
            Self::LongContext => "voyage-3-large",
        }
    }

    /// Published price in USD per one million input tokens.
    #[must_use]
    pub fn default_price_per_million(self) -> f64 {
        match self {
            Self::Fast => 0.02,
            Self::Code | Self::LongContext => 0.18,
        }
    }
}

impl std::fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmbeddingModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(Self::Fast),
            "code" => Ok(Self::Code),
            "long-context" => Ok(Self::LongContext),
            other => Err(format!("unknown embedding model: {other}")),
        }
    }
}

/// Whether the text is being stored or used to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Document,
    Query,
}

impl InputType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Query => "query",
        }
    }
}

impl std::fmt::Display for InputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-model token prices, seeded with the published defaults.
#[derive(Debug, Clone)]
pub struct PriceTable {
    usd_per_million: HashMap<EmbeddingModel, f64>,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            usd_per_million: EmbeddingModel::ALL
                .into_iter()
                .map(|m| (m, m.default_price_per_million()))
                .collect(),
        }
    }
}

impl PriceTable {
    #[must_use]
    pub fn with_price(mut self, model: EmbeddingModel, usd_per_million: f64) -> Self {
        self.usd_per_million.insert(model, usd_per_million);
        self
    }

    #[must_use]
    pub fn price_per_million(&self, model: EmbeddingModel) -> f64 {
        self.usd_per_million
            .get(&model)
            .copied()
            .unwrap_or_else(|| model.default_price_per_million())
    }

    /// Cost in USD of `tokens` tokens on `model`. Fractional token counts are
    /// accepted so apportioned batch shares stay exact.
    #[must_use]
    pub fn cost(&self, model: EmbeddingModel, tokens: f64) -> f64 {
        tokens / 1_000_000.0 * self.price_per_million(model)
    }
}
