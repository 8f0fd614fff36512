//! Embedding client with content-addressed caching, sliding-window rate
//! limiting and per-request cost accounting.
//!
//! [`EmbeddingClient`] sits in front of any [`EmbeddingProvider`]; the
//! Voyage HTTP provider is the production backend.

pub mod batch;
pub mod cache;
pub mod client;
pub mod clock;
pub mod error;
pub mod http;
pub mod ledger;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;
pub mod provider;
pub mod rate_limit;
pub mod retry;
pub mod voyage;

pub use cache::{DEFAULT_TTL, EmbeddingCache};
pub use client::{ClientConfig, EmbeddingClient, EmbeddingRequest, EmbeddingResponse};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EmbedError, Result};
pub use ledger::CostLedger;
pub use model::{EmbeddingModel, InputType, PriceTable};
pub use provider::{EmbeddingProvider, ProviderEmbeddings};
pub use rate_limit::RateLimiter;
pub use voyage::VoyageProvider;
