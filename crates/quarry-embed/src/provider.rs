use std::future::Future;

use crate::error::Result;
use crate::model::{EmbeddingModel, InputType};

/// Vectors for one provider call, in input order, with the billed token total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderEmbeddings {
    pub vectors: Vec<Vec<f32>>,
    pub total_tokens: u64,
}

/// Remote embedding backend. One call embeds every text it is given.
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Embed `texts` in a single network request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    fn embed(
        &self,
        texts: &[String],
        model: EmbeddingModel,
        input_type: InputType,
        truncate: bool,
    ) -> impl Future<Output = Result<ProviderEmbeddings>> + Send;
}
