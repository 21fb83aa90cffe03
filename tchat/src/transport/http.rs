//! HTTP form transport for the outbound `/send` request.
//!
//! [`ReqwestTransport`] is the production implementation. It either talks
//! to the target directly or tunnels through a SOCKS5 proxy with remote
//! name resolution, which is what `.onion` hosts require.

use std::time::Duration;

/// Default timeout for a single send request (Tor circuits are slow).
pub const SEND_TIMEOUT: Duration = Duration::from_mins(1);

/// Errors raised by an [`HttpTransport`].
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The HTTP client could not be constructed (bad proxy address, TLS init).
    #[error("could not build HTTP client: {0}")]
    Client(String),

    /// The request failed before a response status was received.
    #[error("{0}")]
    Request(String),
}

/// A received HTTP response reduced to what the send path inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Numeric status code.
    pub status: u16,
    /// Response body as text (empty if unreadable).
    pub body: String,
}

/// Performs one form-encoded POST.
pub trait HttpTransport: Send + Sync {
    /// POST `fields` as `application/x-www-form-urlencoded` to `url`.
    ///
    /// Any status code is a successful return; only transport failures
    /// are errors.
    fn post_form(
        &self,
        url: &str,
        fields: &[(&str, &str)],
    ) -> impl std::future::Future<Output = Result<HttpResponse, HttpError>> + Send;
}

/// [`HttpTransport`] backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client that connects to targets directly.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Client`] if the client cannot be built.
    pub fn direct() -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Build a client that tunnels every request through the SOCKS5 proxy
    /// at `proxy_address` (`host:port`), resolving hostnames on the proxy.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Client`] if the proxy address is invalid or the
    /// client cannot be built.
    pub fn via_socks(proxy_address: &str) -> Result<Self, HttpError> {
        let proxy = reqwest::Proxy::all(format!("socks5h://{proxy_address}"))
            .map_err(|e| HttpError::Client(format!("invalid proxy {proxy_address}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .proxy(proxy)
            .build()
            .map_err(|e| HttpError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<HttpResponse, HttpError> {
        let response = self
            .client
            .post(url)
            .form(fields)
            .send()
            .await
            .map_err(|e| HttpError::Request(error_chain(&e)))?;

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::debug!(err = %e, status, "could not read response body");
                String::new()
            }
        };
        Ok(HttpResponse { status, body })
    }
}

/// Render an error and all its sources as `outer: inner: ...`.
///
/// reqwest's top-level message omits the cause (refused, proxy failure,
/// timeout), which is the part worth showing.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}
