//! The HTTP client of a transport session.
//!
//! Every [`HttpSession`](super::HttpSession) owns one client, shaped by its
//! [`SessionConfig`]:
//!
//! - requests are traced through `reqwest-tracing`
//! - transient failures are retried with exponential backoff; background
//!   sessions wait longer between attempts than default ones
//! - the `User-Agent` names the session unless the configured headers set one
//! - the proxy, default headers and connect timeout of [`HttpClientConfig`]
//!   apply to every request
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use trawl::http::create_http_client;
//! use trawl::session::SessionConfig;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = SessionConfig::background("app.sync", "/var/lib/app");
//! config.http.retries = 5;
//! config.http.connect_timeout = Some(Duration::from_secs(10));
//!
//! let client = create_http_client(&config)?;
//! # Ok(())
//! # }
//! ```

use crate::session::{SessionConfig, SessionKind};

use reqwest::{
    header::{HeaderMap, HeaderValue, USER_AGENT},
    Proxy,
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use reqwest_tracing::TracingMiddleware;
use std::time::Duration;
use tracing::debug;

/// HTTP settings of a session.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Number of retries of a request failing transiently.
    pub retries: u32,
    /// Optional proxy every request goes through.
    pub proxy: Option<Proxy>,
    /// Default headers sent with every request.
    pub headers: Option<HeaderMap>,
    /// Limit on establishing a connection. Transfers themselves are not
    /// time-bounded.
    pub connect_timeout: Option<Duration>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            proxy: None,
            headers: None,
            connect_timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Backoff between retries of the requests of a session.
///
/// Background transfers are expected to outlive network outages, so their
/// interval grows up to five minutes instead of thirty seconds.
pub fn retry_policy(config: &SessionConfig) -> ExponentialBackoff {
    let (min, max) = match config.kind {
        SessionKind::Default => (Duration::from_millis(500), Duration::from_secs(30)),
        SessionKind::Background { .. } => (Duration::from_secs(1), Duration::from_secs(300)),
    };
    ExponentialBackoff::builder()
        .retry_bounds(min, max)
        .build_with_max_retries(config.http.retries)
}

/// `User-Agent` announcing the crate and the session identifier.
fn session_user_agent(identifier: &str) -> Option<HeaderValue> {
    let agent = format!(
        "{}/{} ({})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        identifier
    );
    HeaderValue::from_str(&agent).ok()
}

/// Builds the client of the session described by `config`.
pub fn create_http_client(config: &SessionConfig) -> Result<ClientWithMiddleware, reqwest::Error> {
    let http = &config.http;
    let mut builder = reqwest::Client::builder();

    if let Some(agent) = session_user_agent(&config.identifier) {
        builder = builder.user_agent(agent);
    }
    if let Some(proxy) = &http.proxy {
        builder = builder.proxy(proxy.clone());
    }
    // Applied after the session agent so a configured `User-Agent` wins.
    if let Some(headers) = &http.headers {
        builder = builder.default_headers(headers.clone());
    }
    if let Some(timeout) = http.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }

    let client = ClientBuilder::new(builder.build()?)
        .with(TracingMiddleware::default())
        .with(RetryTransientMiddleware::new_with_policy(retry_policy(config)))
        .build();

    debug!(
        "HTTP client of session {} ready ({} retries, custom agent: {})",
        config.identifier,
        http.retries,
        http.headers
            .as_ref()
            .is_some_and(|headers| headers.contains_key(USER_AGENT))
    );
    Ok(client)
}
