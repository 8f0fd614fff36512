//! Backoff for provider calls that hit quota or transient gateway errors.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;

use crate::error::EmbedError;

const BASE_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Statuses worth another attempt: quota exhaustion and gateway hiccups.
#[must_use]
pub fn is_retryable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Exponential backoff for `attempt`, capped at one minute.
#[must_use]
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(BASE_BACKOFF_SECS << attempt.min(6)).min(MAX_BACKOFF)
}

/// `Retry-After` seconds when the server sent them, otherwise [`backoff`].
#[must_use]
pub fn retry_delay(response: &reqwest::Response, attempt: u32) -> Duration {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map_or_else(|| backoff(attempt), |secs| Duration::from_secs(secs).min(MAX_BACKOFF))
}

/// Send a request built by `f`, retrying retryable statuses up to `max_retries` times.
///
/// Any other status is handed back for the caller to interpret. A gateway error
/// that persists past the last attempt is handed back as well, so the caller
/// reports it with the response body.
///
/// # Errors
///
/// `EmbedError::RateLimited` when every attempt was answered with 429, and
/// `EmbedError::Http` for transport failures.
pub async fn send_with_retry<F, Fut>(
    provider: &str,
    max_retries: u32,
    mut f: F,
) -> Result<reqwest::Response, EmbedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        let response = f().await?;
        let status = response.status();
        if !is_retryable(status) {
            return Ok(response);
        }
        if attempt >= max_retries {
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(EmbedError::RateLimited);
            }
            return Ok(response);
        }

        let delay = retry_delay(&response, attempt);
        attempt += 1;
        tracing::warn!(
            provider,
            %status,
            attempt,
            max_retries,
            delay_secs = delay.as_secs(),
            "retrying provider request"
        );
        tokio::time::sleep(delay).await;
    }
}
