use crate::fetch::FetchKind;
use thiserror::Error;

/// Why a single retrieval attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchErrorKind {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request timeout")]
    Timeout,

    #[error("HTTP {0}")]
    ServerError(u16),

    #[error("HTTP 429 (rate limited)")]
    RateLimited,

    #[error("HTTP {0}")]
    ClientError(u16),

    #[error("Unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Response too large: {size} bytes (max: {limit} bytes)")]
    OversizedAsset { size: u64, limit: u64 },

    #[error("Request failed: {0}")]
    Request(String),
}

impl FetchErrorKind {
    /// Transient failures are worth another attempt; everything else is
    /// reported immediately
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect(_) | Self::Timeout | Self::ServerError(_) | Self::RateLimited | Self::Body(_)
        )
    }
}

/// A retrieval that failed after the retry policy gave up
#[derive(Debug, Clone, Error)]
#[error("{kind} fetch of {url} failed after {attempts} attempt(s): {cause}")]
pub struct FetchError {
    pub url: String,
    pub kind: FetchKind,
    pub attempts: u32,
    pub cause: FetchErrorKind,
}

impl FetchError {
    pub fn is_oversized(&self) -> bool {
        matches!(self.cause, FetchErrorKind::OversizedAsset { .. })
    }

    /// Returns true for a 404/410 answer, which on an open-ended listing
    /// means the pagination has simply run out
    pub fn is_not_found(&self) -> bool {
        matches!(self.cause, FetchErrorKind::ClientError(404 | 410))
    }
}
