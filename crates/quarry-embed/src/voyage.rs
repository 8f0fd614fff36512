use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EmbedError, Result};
use crate::model::{EmbeddingModel, InputType};
use crate::provider::{EmbeddingProvider, ProviderEmbeddings};
use crate::retry::send_with_retry;

pub const DEFAULT_BASE_URL: &str = "https://api.voyageai.com/v1";
const PROVIDER: &str = "voyage";

/// Client for a Voyage-compatible `/embeddings` endpoint.
#[derive(Clone)]
pub struct VoyageProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
}

impl fmt::Debug for VoyageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoyageProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl VoyageProvider {
    #[must_use]
    pub fn new(api_key: String, mut base_url: String, timeout: Duration) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(timeout),
            api_key,
            base_url,
            max_retries: 3,
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

impl EmbeddingProvider for VoyageProvider {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(
        &self,
        texts: &[String],
        model: EmbeddingModel,
        input_type: InputType,
        truncate: bool,
    ) -> Result<ProviderEmbeddings> {
        if texts.is_empty() {
            return Ok(ProviderEmbeddings::default());
        }

        let body = EmbeddingRequest {
            input: texts,
            model: model.api_name(),
            input_type: input_type.as_str(),
            truncation: truncate,
        };
        let url = format!("{}/embeddings", self.base_url);

        let response = send_with_retry(PROVIDER, self.max_retries, || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::error!("Voyage embedding API error {status}: {text}");
            return Err(EmbedError::Api {
                provider: PROVIDER,
                status: status.as_u16(),
                message: text,
            });
        }

        let resp: EmbeddingResponse = serde_json::from_str(&text)?;
        into_embeddings(resp, texts.len())
    }
}

fn into_embeddings(mut resp: EmbeddingResponse, expected: usize) -> Result<ProviderEmbeddings> {
    if resp.data.is_empty() {
        return Err(EmbedError::EmptyResponse { provider: PROVIDER });
    }
    if resp.data.len() != expected {
        return Err(EmbedError::CountMismatch {
            expected,
            actual: resp.data.len(),
        });
    }
    resp.data.sort_by_key(|d| d.index);

    Ok(ProviderEmbeddings {
        vectors: resp.data.into_iter().map(|d| d.embedding).collect(),
        total_tokens: resp.usage.total_tokens,
    })
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
    input_type: &'a str,
    truncation: bool,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}
