//! Fetch layer: single retrievals with rate limiting and bounded retries
//!
//! Every request, including each retry, is preceded by a randomized delay so
//! the target server only ever sees one slow, sequential client. Failures are
//! returned as [`FetchError`] values; this layer never decides how severe a
//! failure is.

mod backoff;
mod error;
mod fetcher;
mod transport;

pub use backoff::ExponentialBackoff;
pub use error::{FetchError, FetchErrorKind};
pub use fetcher::{Fetcher, RetryPolicy};
pub use transport::{build_http_client, HttpTransport, RequestLimits, Transport};

use std::fmt;
use url::Url;

/// Largest page body accepted for listing and detail retrievals
pub const MAX_PAGE_BYTES: u64 = 10 * 1024 * 1024;

/// What is being retrieved; each kind has its own timeout and size cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    ListingPage,
    DetailPage,
    BinaryAsset,
}

impl FetchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListingPage => "listing-page",
            Self::DetailPage => "detail-page",
            Self::BinaryAsset => "binary-asset",
        }
    }
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response payload: decoded text for pages, raw bytes for assets
#[derive(Debug, Clone)]
pub enum Body {
    Text(String),
    Bytes(Vec<u8>),
}

/// A successful retrieval
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// Final URL after redirects
    pub final_url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Body,
}

impl RawResponse {
    /// Returns the body as text, if it was retrieved as a page
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            Body::Text(text) => Some(text),
            Body::Bytes(_) => None,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self.body {
            Body::Text(text) => text.into_bytes(),
            Body::Bytes(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        match &self.body {
            Body::Text(text) => text.len(),
            Body::Bytes(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
