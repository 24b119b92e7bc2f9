//! Single-attempt retrieval
//!
//! The [`Transport`] trait is the page-rendering boundary: the rest of the
//! crate does not know whether a page came from plain HTTP or a headless
//! browser. [`HttpTransport`] is the plain HTTP implementation.

use crate::config::UserAgentConfig;
use crate::fetch::{Body, FetchErrorKind, FetchKind, RawResponse};
use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use std::time::Duration;
use url::Url;

/// Per-request limits chosen by the fetcher from the retrieval kind
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    pub timeout: Duration,
    pub max_bytes: u64,
}

/// Performs exactly one retrieval attempt; retries are the caller's concern
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &Url,
        kind: FetchKind,
        limits: RequestLimits,
    ) -> Result<RawResponse, FetchErrorKind>;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use policy_harvest::config::UserAgentConfig;
/// use policy_harvest::fetch::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "policy-harvest".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.org/about".to_string(),
///     contact_email: "ops@example.org".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Plain HTTP transport backed by reqwest
pub struct HttpTransport {
    client: Client,
    page_encoding: String,
}

impl HttpTransport {
    /// `page_encoding` is used for pages whose Content-Type has no charset
    pub fn new(client: Client, page_encoding: impl Into<String>) -> Self {
        Self {
            client,
            page_encoding: page_encoding.into(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(
        &self,
        url: &Url,
        kind: FetchKind,
        limits: RequestLimits,
    ) -> Result<RawResponse, FetchErrorKind> {
        let mut response = self
            .client
            .get(url.clone())
            .timeout(limits.timeout)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchErrorKind::RateLimited);
        }
        if status.is_server_error() {
            return Err(FetchErrorKind::ServerError(status.as_u16()));
        }
        if status.is_client_error() {
            return Err(FetchErrorKind::ClientError(status.as_u16()));
        }
        if !status.is_success() {
            return Err(FetchErrorKind::UnexpectedStatus(status.as_u16()));
        }

        if let Some(length) = response.content_length() {
            if length > limits.max_bytes {
                return Err(FetchErrorKind::OversizedAsset {
                    size: length,
                    limit: limits.max_bytes,
                });
            }
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        // Streamed so a body without Content-Length is cut off at the cap
        let bytes = read_capped(&mut response, limits.max_bytes).await?;
        let body = match kind {
            FetchKind::BinaryAsset => Body::Bytes(bytes),
            FetchKind::ListingPage | FetchKind::DetailPage => Body::Text(decode_page(
                &bytes,
                content_type.as_deref(),
                &self.page_encoding,
            )),
        };

        Ok(RawResponse {
            final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

async fn read_capped(response: &mut Response, max_bytes: u64) -> Result<Vec<u8>, FetchErrorKind> {
    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(classify_error)? {
        let size = (bytes.len() + chunk.len()) as u64;
        if size > max_bytes {
            return Err(FetchErrorKind::OversizedAsset {
                size,
                limit: max_bytes,
            });
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// Decodes a page with the Content-Type charset, else `default_encoding`
///
/// Unknown labels fall back to UTF-8; malformed sequences become U+FFFD.
fn decode_page(bytes: &[u8], content_type: Option<&str>, default_encoding: &str) -> String {
    let label = content_type
        .and_then(|ct| {
            ct.split(';').skip(1).find_map(|param| {
                let (key, value) = param.split_once('=')?;
                key.trim()
                    .eq_ignore_ascii_case("charset")
                    .then(|| value.trim().trim_matches('"'))
            })
        })
        .unwrap_or(default_encoding);
    let encoding = Encoding::for_label(label.as_bytes()).unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Maps reqwest errors onto the transient/permanent taxonomy
fn classify_error(error: reqwest::Error) -> FetchErrorKind {
    if error.is_timeout() {
        FetchErrorKind::Timeout
    } else if error.is_connect() || error.is_request() {
        FetchErrorKind::Connect(error.to_string())
    } else if error.is_builder() {
        FetchErrorKind::InvalidUrl(error.to_string())
    } else if error.is_body() || error.is_decode() {
        FetchErrorKind::Body(error.to_string())
    } else {
        FetchErrorKind::Request(error.to_string())
    }
}
