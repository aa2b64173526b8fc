//! Generic HTTP client tools
//!
//! Provide reusable HTTP request processing logic shared by every HTTP-based adapter.
//! Each adapter builds its own `RequestBuilder` (URL, auth headers, body).
//!
//! # design principles
//! - **Pacing lives here** - every attempt first waits on the provider's [`RateLimiter`]
//! - **Throttling never surfaces** - 429s are absorbed by the limiter and retried
//! - **Cancellation everywhere** - limiter sleeps, sends and backoff sleeps all honor the token

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::rate_limiter::{RateLimitVerdict, RateLimiter};

/// Throttled responses retried before giving up with `RateLimited`.
const MAX_THROTTLE_RETRIES: u32 = 10;

/// Characters of a request/response body kept in logs and error details.
const LOGGED_BODY_CHARS: usize = 256;

/// Clip a body for logging. Bodies echo TXT payloads (DKIM keys) and can be large.
pub(crate) fn clip_body(body: &str) -> String {
    match body.char_indices().nth(LOGGED_BODY_CHARS) {
        Some((cut, _)) => format!("{}... [{} bytes total]", &body[..cut], body.len()),
        None => body.to_string(),
    }
}

/// One outbound request, described for logging.
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo<'a> {
    /// Provider name (for logging and errors).
    pub provider: &'a str,
    /// HTTP method, e.g. "GET".
    pub method: &'a str,
    /// URL or action name.
    pub target: &'a str,
}

/// HTTP tool function set
pub struct HttpUtils;

impl HttpUtils {
    /// Performs one HTTP request and returns status and response text.
    ///
    /// Waits on the limiter first. A 429 is reported as `RateLimited` after
    /// the limiter has recorded the throttle.
    pub async fn execute_request(
        request_builder: RequestBuilder,
        limiter: &RateLimiter,
        cancel: &CancellationToken,
        info: RequestInfo<'_>,
    ) -> Result<(u16, String), ProviderError> {
        let RequestInfo {
            provider,
            method,
            target,
        } = info;

        limiter.delay_request(cancel).await?;
        log::debug!("[{provider}] {method} {target}");

        // Send request
        let response = tokio::select! {
            res = request_builder.send() => res.map_err(|e| map_send_error(provider, &e))?,
            () = cancel.cancelled() => {
                return Err(ProviderError::Cancelled { provider: provider.to_string() });
            }
        };

        let status_code = response.status().as_u16();
        log::debug!("[{provider}] Response Status: {status_code}");

        if let RateLimitVerdict::Retry(wait) = limiter.handle_response(status_code, response.headers()) {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RateLimited {
                provider: provider.to_string(),
                retry_after: Some(wait.as_secs()),
                raw_message: Some(clip_body(&body)),
            });
        }

        // Return NetworkError for 502/503/504 (can be retried)
        if matches!(status_code, 502..=504) {
            let body = response.text().await.unwrap_or_default();
            log::warn!("[{provider}] Server error (HTTP {status_code})");
            return Err(ProviderError::NetworkError {
                provider: provider.to_string(),
                detail: format!("HTTP {status_code}: {}", clip_body(&body)),
            });
        }

        // Read response body
        let response_text = response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError {
                provider: provider.to_string(),
                detail: format!("Failed to read response body: {e}"),
            })?;

        log::debug!(
            "[{provider}] Response Body: {}",
            clip_body(&response_text)
        );

        Ok((status_code, response_text))
    }

    /// Parse JSON response
    pub fn parse_json<T>(response_text: &str, provider_name: &str) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
    {
        serde_json::from_str(response_text).map_err(|e| {
            log::error!("[{provider_name}] JSON parse failed: {e}");
            log::error!(
                "[{provider_name}] Raw response: {}",
                clip_body(response_text)
            );
            ProviderError::ParseError {
                provider: provider_name.to_string(),
                detail: e.to_string(),
            }
        })
    }

    /// Performs an HTTP request with retries.
    ///
    /// # Retry strategy
    /// - Throttled responses: retried up to `MAX_THROTTLE_RETRIES` times, the
    ///   wait is owned by the limiter
    /// - Connect failures: always retried (nothing reached the server)
    /// - Timeouts, network errors, 502-504: retried only when `idempotent`
    /// - Exponential backoff: 100ms, 200ms, 400ms, 800ms, ... (maximum 10 seconds)
    /// - Business errors (authentication failure, record does not exist, etc.) will not be retried
    pub async fn execute_request_with_retry(
        request_builder: RequestBuilder,
        limiter: &RateLimiter,
        cancel: &CancellationToken,
        info: RequestInfo<'_>,
        max_retries: u32,
        idempotent: bool,
    ) -> Result<(u16, String), ProviderError> {
        let provider = info.provider;
        let mut failures = 0u32;
        let mut throttles = 0u32;

        loop {
            // Clone the request (RequestBuilder can only be used once)
            let Some(req) = request_builder.try_clone() else {
                log::warn!("[{provider}] Cannot clone request, disabling retry");
                return Self::execute_request(request_builder, limiter, cancel, info).await;
            };

            let err = match Self::execute_request(req, limiter, cancel, info).await {
                Ok(resp) => return Ok(resp),
                Err(e) => e,
            };

            match &err {
                ProviderError::RateLimited { .. } if throttles < MAX_THROTTLE_RETRIES => {
                    throttles += 1;
                    log::warn!(
                        "[{provider}] Throttled (attempt {throttles}/{MAX_THROTTLE_RETRIES}), waiting on rate limiter"
                    );
                }
                ProviderError::RateLimited { .. } => return Err(err),
                e if failures < max_retries && e.is_retryable(idempotent) => {
                    let delay = backoff_delay(failures);
                    failures += 1;
                    log::warn!(
                        "[{}] Request failed (attempt {}/{}), retrying in {:.1}s: {}",
                        provider,
                        failures,
                        max_retries,
                        delay.as_secs_f32(),
                        e
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => {
                            return Err(ProviderError::Cancelled { provider: provider.to_string() });
                        }
                    }
                }
                _ => return Err(err),
            }
        }
    }
}

fn map_send_error(provider: &str, e: &reqwest::Error) -> ProviderError {
    if e.is_connect() {
        ProviderError::ConnectFailed {
            provider: provider.to_string(),
            detail: e.to_string(),
        }
    } else if e.is_timeout() {
        ProviderError::Timeout {
            provider: provider.to_string(),
            detail: e.to_string(),
        }
    } else {
        ProviderError::NetworkError {
            provider: provider.to_string(),
            detail: e.to_string(),
        }
    }
}

/// Calculate exponential backoff delay
///
/// Backoff strategy: 100ms, 200ms, 400ms, 800ms, 1.6s, ...
/// Maximum delay limit is 10 seconds
fn backoff_delay(attempt: u32) -> Duration {
    let capped_attempt = attempt.min(20); // Prevent 2^attempt from overflowing
    let delay_ms = 100_u64.saturating_mul(1_u64 << capped_attempt);
    let delay_ms = delay_ms.min(10_000); // Maximum 10 seconds
    Duration::from_millis(delay_ms)
}
