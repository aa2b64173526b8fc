//! Per-provider request pacer.
//!
//! Before each request the caller awaits [`RateLimiter::delay_request`], which
//! reserves the next permitted instant. After each response the caller feeds
//! the status and headers to [`RateLimiter::handle_response`], which
//! recomputes the pacing:
//!
//! - HTTP 429: sleep for `Retry-After` (counted from when the response
//!   arrived, capped at [`MAX_WAIT`]), then retry
//! - remaining quota above half the limit: no delay
//! - otherwise: spread the remaining quota over the reset window,
//!   `reset / (remaining + 1)`
//!
//! One limiter is shared by every in-flight request of a provider value.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{ProviderError, Result};
use crate::utils::datetime::parse_unix_timestamp;

/// Fallback wait for a 429 without a usable `Retry-After`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Upper bound for any server-supplied wait or reset window.
pub const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Reset values above this are absolute epoch timestamps, not deltas.
const EPOCH_THRESHOLD: u64 = 1_000_000_000;

/// What the caller should do with the response it just received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitVerdict {
    /// Use the response.
    Proceed,
    /// Throttled: discard the response and retry after the limiter's delay.
    Retry(Duration),
}

#[derive(Debug)]
struct LimiterState {
    delay: Duration,
    last_request: Option<Instant>,
    reset_at: Option<Instant>,
}

#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    base_delay: Duration,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    /// `base_delay` is the steady-state gap between two requests.
    pub fn new(name: impl Into<String>, base_delay: Duration) -> Self {
        Self {
            name: name.into(),
            base_delay,
            state: Mutex::new(LimiterState {
                delay: base_delay,
                last_request: None,
                reset_at: None,
            }),
        }
    }

    /// A limiter that never delays unless the server pushes back.
    pub fn unlimited(name: impl Into<String>) -> Self {
        Self::new(name, Duration::ZERO)
    }

    fn state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The delay currently applied between requests.
    pub fn current_delay(&self) -> Duration {
        self.state().delay
    }

    /// Reserve the next request slot and return when it starts.
    fn reserve(&self) -> Instant {
        let now = Instant::now();
        let mut s = self.state();
        let mut next = s.last_request.map_or(now, |last| last + s.delay);
        if let Some(reset) = s.reset_at
            && next > reset
        {
            next = reset;
        }
        if next < now {
            next = now;
        }
        s.last_request = Some(next);
        next
    }

    /// Wait until the next request is permitted.
    ///
    /// Returns `Cancelled` promptly if `cancel` fires while waiting.
    pub async fn delay_request(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(self.cancelled());
        }
        let at = self.reserve();
        if at <= Instant::now() {
            return Ok(());
        }
        log::debug!(
            "[{}] pacing: sleeping {:.3}s",
            self.name,
            at.saturating_duration_since(Instant::now()).as_secs_f64()
        );
        tokio::select! {
            () = tokio::time::sleep_until(at) => Ok(()),
            () = cancel.cancelled() => Err(self.cancelled()),
        }
    }

    fn cancelled(&self) -> ProviderError {
        ProviderError::Cancelled {
            provider: self.name.clone(),
        }
    }

    /// Inspect a response and recompute pacing.
    pub fn handle_response(&self, status: u16, headers: &HeaderMap) -> RateLimitVerdict {
        if status == 429 {
            let wait = retry_after(headers).unwrap_or(DEFAULT_RETRY_AFTER);
            return RateLimitVerdict::Retry(self.throttle(wait));
        }

        let now = Instant::now();
        let mut s = self.state();
        if let Some(quota) = Quota::from_headers(headers) {
            // remaining 不应超过 limit
            let remaining = quota.remaining.min(quota.limit);
            let delay = if remaining == 0 {
                quota.reset
            } else if remaining.saturating_mul(2) > quota.limit {
                Duration::ZERO
            } else {
                quota.reset / u32::try_from(remaining.saturating_add(1)).unwrap_or(u32::MAX)
            };
            s.delay = delay.max(self.base_delay);
            s.reset_at = Some(now + quota.reset);
        } else if s.reset_at.is_some_and(|reset| now >= reset) {
            s.delay = self.base_delay;
            s.reset_at = None;
        }
        RateLimitVerdict::Proceed
    }

    /// Record a vendor-specific throttle (rate-limit error code in a 200 body).
    pub fn handle_rate_limited(&self, retry_after_secs: Option<u64>) -> Duration {
        self.throttle(retry_after_secs.map_or(DEFAULT_RETRY_AFTER, Duration::from_secs))
    }

    fn throttle(&self, wait: Duration) -> Duration {
        let wait = wait.min(MAX_WAIT);
        let now = Instant::now();
        let mut s = self.state();
        s.delay = wait.max(self.base_delay);
        s.last_request = Some(now);
        s.reset_at = Some(now + wait);
        log::warn!(
            "[{}] rate limited, backing off {:.1}s",
            self.name,
            wait.as_secs_f32()
        );
        wait
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn header_u64(headers: &HeaderMap, names: &[&str]) -> Option<u64> {
    names.iter().find_map(|name| {
        let raw = headers.get(*name)?.to_str().ok()?.trim();
        raw.parse::<u64>().ok().or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v.ceil() as u64)
        })
    })
}

/// `Retry-After` as delta-seconds or an HTTP date.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(secs) = header_u64(headers, &["retry-after"]) {
        return Some(Duration::from_secs(secs));
    }
    let raw = headers.get("retry-after")?.to_str().ok()?;
    let when = DateTime::parse_from_rfc2822(raw.trim()).ok()?.with_timezone(&Utc);
    Some((when - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}

#[derive(Debug, Clone, Copy)]
struct Quota {
    limit: u64,
    remaining: u64,
    reset: Duration,
}

impl Quota {
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let limit = header_u64(headers, &["ratelimit-limit", "x-ratelimit-limit"])?;
        let remaining = header_u64(headers, &["ratelimit-remaining", "x-ratelimit-remaining"])?;
        let reset_raw = header_u64(headers, &["ratelimit-reset", "x-ratelimit-reset"])?;

        let reset = if reset_raw > EPOCH_THRESHOLD {
            let at = parse_unix_timestamp(i64::try_from(reset_raw).ok()?)?;
            (at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
        } else {
            Duration::from_secs(reset_raw)
        };
        Some(Self {
            limit,
            remaining,
            reset: reset.min(MAX_WAIT),
        })
    }
}
