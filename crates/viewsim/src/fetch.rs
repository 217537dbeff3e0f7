// Opaque HTTP transport seam. The engine performs exactly one fetch per
// I/O-bearing step and consumes the result through this trait.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::trace;
use url::Url;

use crate::config::HttpConfig;
use crate::error::SessionError;

/// Outcome of one HTTP fetch. Transport failures are reported in-band
/// (`success == false` with a message) rather than as errors, so a
/// failed fetch stays a retryable unit of work for the caller.
#[derive(Debug, Clone, Default)]
pub struct FetchResponse {
    /// HTTP status code, 0 when the request never produced a response.
    pub status: u16,
    pub success: bool,
    /// Status reason phrase, or the transport error description.
    pub message: String,
    /// Response headers in arrival order.
    pub headers: Vec<(String, String)>,
    /// Response body; empty when the caller did not ask for it.
    pub body: Bytes,
    /// Bytes drained from the wire, collected or not.
    pub body_bytes: u64,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    /// Approximate bytes sent (request line plus headers).
    pub sent_bytes: u64,
    /// Text rendering of the request headers, for reporting.
    pub request_headers: String,
}

impl FetchResponse {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }
}

/// One-shot HTTP GET. `collect_body` controls whether the body is kept;
/// it is always fully drained before this returns, so the underlying
/// connection can be reused regardless of what the caller does with the
/// result.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str, collect_body: bool) -> FetchResponse;
}

/// Production transport on a shared reqwest client.
pub struct HttpFetcher {
    client: Client,
    config: HttpConfig,
}

impl HttpFetcher {
    pub fn new(config: HttpConfig) -> Result<Self, SessionError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| SessionError::configuration(format!("bad header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| SessionError::configuration(format!("bad header value: {e}")))?;
            headers.insert(name, value);
        }

        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::default()
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .redirect(redirect)
            .build()
            .map_err(|e| SessionError::configuration(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Text form of the request headers, matching what the client sends.
    fn request_headers_text(&self, url: &Url) -> String {
        let mut text = format!(
            "GET {} HTTP/1.1\nHost: {}\nUser-Agent: {}\n",
            url.path(),
            url.host_str().unwrap_or_default(),
            self.config.user_agent
        );
        for (name, value) in &self.config.headers {
            text.push_str(name);
            text.push_str(": ");
            text.push_str(value);
            text.push('\n');
        }
        text
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str, collect_body: bool) -> FetchResponse {
        let parsed = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => return FetchResponse::failure(format!("invalid URL {url}: {e}")),
        };
        let request_headers = self.request_headers_text(&parsed);
        let sent_bytes = request_headers.len() as u64;

        let response = match self
            .client
            .get(parsed)
            .timeout(self.config.request_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return FetchResponse::failure(format!("request failed: {e}")),
        };

        let status = response.status();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let content_type = header_value(&headers, "content-type");
        let content_encoding = header_value(&headers, "content-encoding");

        // Drain the body in chunks whether or not it is kept, releasing
        // the connection back to the pool before the step returns.
        let mut body = BytesMut::new();
        let mut drained: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => {
                    drained += chunk.len() as u64;
                    if collect_body {
                        body.extend_from_slice(&chunk);
                    }
                }
                Err(e) => {
                    return FetchResponse {
                        status: status.as_u16(),
                        success: false,
                        message: format!("body read failed: {e}"),
                        headers,
                        body_bytes: drained,
                        content_type,
                        content_encoding,
                        sent_bytes,
                        request_headers,
                        ..Default::default()
                    };
                }
            }
        }

        trace!(url, status = status.as_u16(), bytes = drained, "fetch complete");

        FetchResponse {
            status: status.as_u16(),
            success: status.is_success(),
            message: status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string(),
            headers,
            body: body.freeze(),
            body_bytes: drained,
            content_type,
            content_encoding,
            sent_bytes,
            request_headers,
        }
    }
}

fn header_value(headers: &[(String, String)], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.clone())
}
