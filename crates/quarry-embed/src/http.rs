//! HTTP client shared by the embedding provider and the contextualizer.

use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Builder preconfigured with Quarry's user-agent, timeouts and redirect policy.
#[must_use]
pub fn client_builder(request_timeout: Duration) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(concat!("quarry/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .timeout(request_timeout)
        .redirect(reqwest::redirect::Policy::limited(5))
}

/// Build the client. Construction only fails when the TLS backend cannot
/// initialise, which is a broken build rather than a runtime condition.
#[must_use]
pub fn default_client(request_timeout: Duration) -> reqwest::Client {
    client_builder(request_timeout)
        .build()
        .expect("TLS backend failed to initialise")
}
