//! Short natural-language context per chunk, prepended to the content view
//! before embedding.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunker::Chunk;
use crate::error::{IndexError, Result};

pub const DEFAULT_CONTEXT_MODEL: &str = "claude-3-5-haiku-latest";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER: &str = "claude";
const MAX_SOURCE_CHARS: usize = 2000;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Context string for one chunk and what producing it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkContext {
    pub context: String,
    pub cost_usd: f64,
}

impl ChunkContext {
    #[must_use]
    pub fn free(context: String) -> Self {
        Self {
            context,
            cost_usd: 0.0,
        }
    }
}

pub trait Contextualizer: Send + Sync {
    /// One context per chunk, in chunk order.
    fn generate_contexts_batch<'a>(
        &'a self,
        chunks: &'a [Chunk],
        file_path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ChunkContext>>>;
}

/// Deterministic context used when no contextualizer is configured or it fails.
#[must_use]
pub fn fallback_context(file_path: &str, chunk: &Chunk) -> String {
    format!(
        "Code from {file_path} (lines {}-{})",
        chunk.start_line, chunk.end_line
    )
}

/// Contextualizer that never calls out and always answers with [`fallback_context`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackContextualizer;

impl Contextualizer for FallbackContextualizer {
    fn generate_contexts_batch<'a>(
        &'a self,
        chunks: &'a [Chunk],
        file_path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ChunkContext>>> {
        Box::pin(async move {
            Ok(chunks
                .iter()
                .map(|c| ChunkContext::free(fallback_context(file_path, c)))
                .collect())
        })
    }
}

/// USD per million input and output tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl Default for ContextPricing {
    fn default() -> Self {
        Self {
            input_per_million: 0.80,
            output_per_million: 4.0,
        }
    }
}

impl ContextPricing {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (output_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

/// Claude Messages API contextualizer. One request per batch of chunks.
#[derive(Clone)]
pub struct ClaudeContextualizer {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
    max_retries: u32,
    pricing: ContextPricing,
}

impl fmt::Debug for ClaudeContextualizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaudeContextualizer")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl ClaudeContextualizer {
    /// `max_tokens` bounds the output of one context, not the whole batch.
    #[must_use]
    pub fn new(api_key: String, model: String, max_tokens: u32, timeout: Duration) -> Self {
        Self {
            client: quarry_embed::http::default_client(timeout),
            api_key,
            model,
            max_tokens,
            base_url: DEFAULT_BASE_URL.to_owned(),
            max_retries: 3,
            pricing: ContextPricing::default(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, mut base_url: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_pricing(mut self, pricing: ContextPricing) -> Self {
        self.pricing = pricing;
        self
    }

    async fn request_contexts(&self, chunks: &[Chunk], file_path: &str) -> Result<Vec<ChunkContext>> {
        let prompt = build_prompt(chunks, file_path);
        let budget = self
            .max_tokens
            .saturating_mul(u32::try_from(chunks.len()).unwrap_or(u32::MAX));
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: budget,
            messages: [RequestMessage {
                role: "user",
                content: &prompt,
            }],
        };
        let url = format!("{}/messages", self.base_url);

        let response = quarry_embed::retry::send_with_retry(PROVIDER, self.max_retries, || {
            self.client
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body)
                .send()
        })
        .await
        .map_err(|e| IndexError::Contextualizer(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| IndexError::Contextualizer(e.to_string()))?;
        if !status.is_success() {
            tracing::error!("Claude API error {status}: {text}");
            return Err(IndexError::Contextualizer(format!(
                "context request failed (status {status})"
            )));
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)?;
        let reply = parsed
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<String>();

        let cost = self
            .pricing
            .cost(parsed.usage.input_tokens, parsed.usage.output_tokens);
        #[allow(clippy::cast_precision_loss)]
        let cost_each = cost / chunks.len() as f64;

        // The request is billed even when the reply is unusable.
        let contexts = parse_contexts(&reply, chunks.len()).unwrap_or_else(|e| {
            tracing::warn!(file = %file_path, cost_usd = cost, "unusable context reply, using fallback: {e}");
            chunks
                .iter()
                .map(|chunk| fallback_context(file_path, chunk))
                .collect()
        });

        Ok(contexts
            .into_iter()
            .map(|context| ChunkContext {
                context,
                cost_usd: cost_each,
            })
            .collect())
    }
}

impl Contextualizer for ClaudeContextualizer {
    fn generate_contexts_batch<'a>(
        &'a self,
        chunks: &'a [Chunk],
        file_path: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ChunkContext>>> {
        Box::pin(async move {
            if chunks.is_empty() {
                return Ok(Vec::new());
            }
            self.request_contexts(chunks, file_path).await
        })
    }
}

fn build_prompt(chunks: &[Chunk], file_path: &str) -> String {
    use std::fmt::Write;

    let mut prompt = format!(
        "Below are {} code chunks from the file `{file_path}`.\n\
         For each chunk write one or two sentences situating it within the file, \
         to improve search retrieval of the chunk.\n\
         Answer with only a JSON array of {} strings, one per chunk, in order.\n",
        chunks.len(),
        chunks.len()
    );
    for (i, chunk) in chunks.iter().enumerate() {
        let source: String = chunk.content.chars().take(MAX_SOURCE_CHARS).collect();
        let _ = write!(
            prompt,
            "\n<chunk index=\"{i}\" kind=\"{}\" lines=\"{}-{}\">\n{source}\n</chunk>\n",
            chunk.kind, chunk.start_line, chunk.end_line
        );
    }
    prompt
}

/// Extract the JSON string array from a model reply that may wrap it in prose
/// or a code fence.
fn parse_contexts(reply: &str, expected: usize) -> Result<Vec<String>> {
    let (Some(start), Some(end)) = (reply.find('['), reply.rfind(']')) else {
        return Err(IndexError::Contextualizer(
            "reply contains no JSON array".into(),
        ));
    };
    if end < start {
        return Err(IndexError::Contextualizer(
            "reply contains no JSON array".into(),
        ));
    }
    let contexts: Vec<String> = serde_json::from_str(&reply[start..=end])
        .map_err(|e| IndexError::Contextualizer(format!("malformed context array: {e}")))?;
    if contexts.len() != expected {
        return Err(IndexError::Contextualizer(format!(
            "expected {expected} contexts, got {}",
            contexts.len()
        )));
    }
    Ok(contexts
        .into_iter()
        .map(|c| c.trim().to_owned())
        .collect())
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [RequestMessage<'a>; 1],
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkKind;
    use crate::languages::Lang;

    fn chunks() -> Vec<Chunk> {
        vec![
            Chunk::new("def a():\n    pass\n".into(), 0, 1, ChunkKind::Function, Lang::Python)
                .with_symbol(Some("a".into())),
            Chunk::new("def b():\n    pass\n".into(), 3, 4, ChunkKind::Function, Lang::Python)
                .with_symbol(Some("b".into())),
        ]
    }

    async fn spawn_mock_server(response: String) -> u16 {
        use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let (reader, mut writer) = stream.split();
            let mut buf_reader = BufReader::new(reader);
            let mut content_length = 0usize;
            let mut line = String::new();
            loop {
                line.clear();
                buf_reader.read_line(&mut line).await.unwrap_or(0);
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap_or(0);
                }
                if line == "\r\n" || line == "\n" || line.is_empty() {
                    break;
                }
            }
            let mut body = vec![0u8; content_length];
            buf_reader.read_exact(&mut body).await.ok();
            writer.write_all(response.as_bytes()).await.ok();
        });

        port
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    #[test]
    fn fallback_names_path_and_lines() {
        let chunk = &chunks()[1];
        assert_eq!(
            fallback_context("src/app.py", chunk),
            "Code from src/app.py (lines 3-4)"
        );
    }

    #[tokio::test]
    async fn fallback_contextualizer_is_free() {
        let chunks = chunks();
        let out = FallbackContextualizer
            .generate_contexts_batch(&chunks, "m.py")
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|c| c.cost_usd == 0.0));
        assert_eq!(out[0].context, "Code from m.py (lines 0-1)");
    }

    #[test]
    fn prompt_lists_every_chunk() {
        let prompt = build_prompt(&chunks(), "m.py");
        assert!(prompt.contains("`m.py`"));
        assert!(prompt.contains("JSON array of 2 strings"));
        assert!(prompt.contains("<chunk index=\"0\" kind=\"function\" lines=\"0-1\">"));
        assert!(prompt.contains("<chunk index=\"1\" kind=\"function\" lines=\"3-4\">"));
    }

    #[test]
    fn parse_tolerates_code_fence() {
        let reply = "```json\n[\"first\", \" second \"]\n```";
        assert_eq!(parse_contexts(reply, 2).unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn parse_rejects_wrong_count_and_garbage() {
        assert!(parse_contexts("[\"only one\"]", 2).is_err());
        assert!(parse_contexts("no array here", 1).is_err());
        assert!(parse_contexts("] backwards [", 1).is_err());
    }

    #[test]
    fn pricing_sums_input_and_output() {
        let cost = ContextPricing::default().cost(1_000_000, 1_000_000);
        assert!((cost - 4.8).abs() < 1e-9);
    }

    #[test]
    fn debug_redacts_key() {
        let ctx = ClaudeContextualizer::new(
            "sk-secret".into(),
            DEFAULT_CONTEXT_MODEL.into(),
            150,
            Duration::from_secs(5),
        );
        let debug = format!("{ctx:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn claude_batch_splits_cost_evenly() {
        let body = serde_json::json!({
            "content": [{"type": "text", "text": "[\"A helper.\", \"B helper.\"]"}],
            "usage": {"input_tokens": 1000, "output_tokens": 100}
        })
        .to_string();
        let port = spawn_mock_server(http_response("200 OK", &body)).await;
        let ctx = ClaudeContextualizer::new(
            "key".into(),
            DEFAULT_CONTEXT_MODEL.into(),
            150,
            Duration::from_secs(5),
        )
        .with_base_url(format!("http://127.0.0.1:{port}/v1/"));

        let chunks = chunks();
        let out = ctx.generate_contexts_batch(&chunks, "m.py").await.unwrap();

        assert_eq!(out[0].context, "A helper.");
        assert_eq!(out[1].context, "B helper.");
        let total = ContextPricing::default().cost(1000, 100);
        assert!((out[0].cost_usd - total / 2.0).abs() < 1e-12);
        assert!((out[0].cost_usd + out[1].cost_usd - total).abs() < 1e-12);
    }

    #[tokio::test]
    async fn unusable_reply_falls_back_but_keeps_cost() {
        let body = serde_json::json!({
            "content": [{"type": "text", "text": "Sorry, I cannot help with that."}],
            "usage": {"input_tokens": 2000, "output_tokens": 40}
        })
        .to_string();
        let port = spawn_mock_server(http_response("200 OK", &body)).await;
        let ctx = ClaudeContextualizer::new(
            "key".into(),
            DEFAULT_CONTEXT_MODEL.into(),
            150,
            Duration::from_secs(5),
        )
        .with_base_url(format!("http://127.0.0.1:{port}/v1"));

        let chunks = chunks();
        let out = ctx.generate_contexts_batch(&chunks, "m.py").await.unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].context, fallback_context("m.py", &chunks[0]));
        assert_eq!(out[1].context, fallback_context("m.py", &chunks[1]));
        let total = ContextPricing::default().cost(2000, 40);
        assert!(total > 0.0);
        assert!((out.iter().map(|c| c.cost_usd).sum::<f64>() - total).abs() < 1e-12);
    }

    #[tokio::test]
    async fn claude_error_status_is_contextualizer_error() {
        let port =
            spawn_mock_server(http_response("500 Internal Server Error", "{\"error\":{}}")).await;
        let ctx = ClaudeContextualizer::new(
            "key".into(),
            DEFAULT_CONTEXT_MODEL.into(),
            150,
            Duration::from_secs(5),
        )
        .with_base_url(format!("http://127.0.0.1:{port}/v1"));

        let chunks = chunks();
        let err = ctx
            .generate_contexts_batch(&chunks, "m.py")
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Contextualizer(_)));
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        let ctx = ClaudeContextualizer::new(
            "key".into(),
            DEFAULT_CONTEXT_MODEL.into(),
            150,
            Duration::from_secs(5),
        )
        .with_base_url("http://127.0.0.1:9".into());
        let out = ctx.generate_contexts_batch(&[], "m.py").await.unwrap();
        assert!(out.is_empty());
    }
}
