//! Rate-limited, retrying fetcher
//!
//! This module wraps a [`Transport`] with:
//! - A randomized politeness delay before every request, retries included
//! - Bounded retries for transient failures with exponential backoff
//! - Per-kind timeouts and size caps

use crate::config::{Config, FetchConfig};
use crate::fetch::{
    build_http_client, ExponentialBackoff, FetchError, FetchErrorKind, FetchKind, HttpTransport,
    RawResponse, RequestLimits, Transport, MAX_PAGE_BYTES,
};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// How many times to try, and how long to wait in between
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Inclusive range of the randomized pre-request delay (milliseconds)
    pub request_delay_ms: (u64, u64),
    pub backoff: ExponentialBackoff,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.retry_times.max(1),
            request_delay_ms: (config.request_delay_ms[0], config.request_delay_ms[1]),
            backoff: ExponentialBackoff::new(config.retry_delay_ms[0], config.retry_delay_ms[1]),
        }
    }

    /// Picks the politeness delay for one request
    fn request_delay(&self) -> Duration {
        let (min, max) = self.request_delay_ms;
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// Full wait before attempt number `attempt` (1-based)
    fn wait_before(&self, attempt: u32) -> Duration {
        let mut delay = self.request_delay();
        if attempt > 1 {
            delay += self.backoff.delay(attempt - 2);
        }
        delay
    }
}

/// The single entry point for network retrieval
///
/// Requests are issued strictly one at a time by the caller; the fetcher
/// itself holds no mutable state and can be shared by reference.
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    listing_limits: RequestLimits,
    detail_limits: RequestLimits,
    asset_limits: RequestLimits,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, config: &FetchConfig) -> Self {
        Self {
            transport,
            retry: RetryPolicy::from_config(config),
            listing_limits: RequestLimits {
                timeout: Duration::from_secs(config.listing_timeout_secs),
                max_bytes: MAX_PAGE_BYTES,
            },
            detail_limits: RequestLimits {
                timeout: Duration::from_secs(config.detail_timeout_secs),
                max_bytes: MAX_PAGE_BYTES,
            },
            asset_limits: RequestLimits {
                timeout: Duration::from_secs(config.asset_timeout_secs),
                max_bytes: config.max_file_size,
            },
        }
    }

    /// Builds a fetcher over plain HTTP from the full configuration
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.user_agent)?;
        let transport = HttpTransport::new(client, config.fetch.page_encoding.clone());
        Ok(Self::new(Arc::new(transport), &config.fetch))
    }

    fn limits_for(&self, kind: FetchKind) -> RequestLimits {
        match kind {
            FetchKind::ListingPage => self.listing_limits,
            FetchKind::DetailPage => self.detail_limits,
            FetchKind::BinaryAsset => self.asset_limits,
        }
    }

    /// Retrieves `url`, retrying transient failures up to the configured
    /// attempt count
    ///
    /// Permanent failures (4xx, oversized bodies, malformed URLs) are
    /// returned after the first attempt.
    pub async fn fetch(&self, url: &str, kind: FetchKind) -> Result<RawResponse, FetchError> {
        let parsed = match Url::parse(url) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => u,
            Ok(u) => {
                return Err(FetchError {
                    url: url.to_string(),
                    kind,
                    attempts: 0,
                    cause: FetchErrorKind::InvalidUrl(format!("unsupported scheme {}", u.scheme())),
                })
            }
            Err(e) => {
                return Err(FetchError {
                    url: url.to_string(),
                    kind,
                    attempts: 0,
                    cause: FetchErrorKind::InvalidUrl(e.to_string()),
                })
            }
        };

        let limits = self.limits_for(kind);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let wait = self.retry.wait_before(attempt);
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }

            match self.transport.get(&parsed, kind, limits).await {
                Ok(response) => {
                    tracing::debug!(
                        "Fetched {} {} ({} bytes, attempt {})",
                        kind,
                        url,
                        response.len(),
                        attempt
                    );
                    return Ok(response);
                }
                Err(cause) if cause.is_transient() && attempt < self.retry.max_attempts => {
                    tracing::warn!(
                        "Attempt {}/{} for {} failed: {}; retrying",
                        attempt,
                        self.retry.max_attempts,
                        url,
                        cause
                    );
                }
                Err(cause) => {
                    return Err(FetchError {
                        url: url.to_string(),
                        kind,
                        attempts: attempt,
                        cause,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Body;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    /// Replays a fixed script of outcomes, then repeats the last one
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<String, FetchErrorKind>>>,
        last: Result<String, FetchErrorKind>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<String, FetchErrorKind>>) -> Self {
            let last = script
                .last()
                .cloned()
                .unwrap_or_else(|| Ok(String::new()));
            Self {
                script: Mutex::new(script.into()),
                last,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(
            &self,
            url: &Url,
            _kind: FetchKind,
            _limits: RequestLimits,
        ) -> Result<RawResponse, FetchErrorKind> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.last.clone());
            next.map(|text| RawResponse {
                final_url: url.clone(),
                status: 200,
                content_type: Some("text/html".to_string()),
                body: Body::Text(text),
            })
        }
    }

    fn fetch_config(retry_times: u32, delay_ms: u64) -> FetchConfig {
        FetchConfig {
            retry_times,
            retry_delay_ms: [0, 0],
            request_delay_ms: [delay_ms, delay_ms],
            max_file_size: 1024,
            page_encoding: "utf-8".to_string(),
            listing_timeout_secs: 5,
            detail_timeout_secs: 5,
            asset_timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(FetchErrorKind::ServerError(503)),
            Err(FetchErrorKind::Timeout),
            Ok("<html>ok</html>".to_string()),
        ]));
        let fetcher = Fetcher::new(transport.clone(), &fetch_config(3, 0));

        let response = fetcher
            .fetch("http://example.org/index.html", FetchKind::ListingPage)
            .await
            .unwrap();

        assert_eq!(response.text(), Some("<html>ok</html>"));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_exactly_max_attempts() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(
            FetchErrorKind::ServerError(500),
        )]));
        let fetcher = Fetcher::new(transport.clone(), &fetch_config(4, 0));

        let err = fetcher
            .fetch("http://example.org/a.html", FetchKind::DetailPage)
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 4);
        assert_eq!(err.attempts, 4);
        assert_eq!(err.cause, FetchErrorKind::ServerError(500));
        assert_eq!(err.kind, FetchKind::DetailPage);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(
            FetchErrorKind::ClientError(404),
        )]));
        let fetcher = Fetcher::new(transport.clone(), &fetch_config(3, 0));

        let err = fetcher
            .fetch("http://example.org/gone.html", FetchKind::ListingPage)
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_oversized_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new(vec![Err(
            FetchErrorKind::OversizedAsset {
                size: 4096,
                limit: 1024,
            },
        )]));
        let fetcher = Fetcher::new(transport.clone(), &fetch_config(3, 0));

        let err = fetcher
            .fetch("http://example.org/big.pdf", FetchKind::BinaryAsset)
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 1);
        assert!(err.is_oversized());
    }

    #[tokio::test]
    async fn test_invalid_url_makes_no_request() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok(String::new())]));
        let fetcher = Fetcher::new(transport.clone(), &fetch_config(3, 0));

        let err = fetcher
            .fetch("javascript:void(0)", FetchKind::DetailPage)
            .await
            .unwrap_err();

        assert_eq!(transport.calls(), 0);
        assert_eq!(err.attempts, 0);
        assert!(matches!(err.cause, FetchErrorKind::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_delay_precedes_every_attempt() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Err(FetchErrorKind::RateLimited),
            Ok("done".to_string()),
        ]));
        let fetcher = Fetcher::new(transport.clone(), &fetch_config(3, 40));

        let started = Instant::now();
        fetcher
            .fetch("http://example.org/index.html", FetchKind::ListingPage)
            .await
            .unwrap();

        assert_eq!(transport.calls(), 2);
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn test_request_delay_within_range() {
        let mut config = fetch_config(1, 0);
        config.request_delay_ms = [10, 20];
        let policy = RetryPolicy::from_config(&config);
        for _ in 0..50 {
            let delay = policy.request_delay().as_millis();
            assert!((10..=20).contains(&delay));
        }
    }
}
