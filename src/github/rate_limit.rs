use reqwest::header::HeaderMap;
use std::time::Duration;

/// Header names used by the API to report quota state
pub mod headers {
    pub const REMAINING: &str = "x-ratelimit-remaining";
    pub const RESET: &str = "x-ratelimit-reset";
    pub const RETRY_AFTER: &str = "retry-after";
}

/// Quota information attached to a response.
///
/// Every field is optional: a missing or unparsable header means the backend
/// told us nothing, and no wait is derived from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Requests left in the current primary window
    pub remaining: Option<u64>,
    /// Epoch seconds at which the primary window resets
    pub reset_at: Option<i64>,
    /// Seconds to wait before retrying, sent with secondary limits
    pub retry_after: Option<u64>,
}

impl RateLimitInfo {
    pub fn from_headers(map: &HeaderMap) -> Self {
        fn parse<T: std::str::FromStr>(map: &HeaderMap, name: &str) -> Option<T> {
            map.get(name)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<T>().ok())
        }

        RateLimitInfo {
            remaining: parse(map, headers::REMAINING),
            reset_at: parse(map, headers::RESET),
            retry_after: parse(map, headers::RETRY_AFTER),
        }
    }

    /// Wait needed before the next request after a successful page.
    ///
    /// Only applies once the remaining quota is down to one request or less.
    pub fn quota_wait(&self, now_ms: i64, buffer: Duration) -> Option<Duration> {
        match self.remaining {
            Some(remaining) if remaining <= 1 => self.reset_wait(now_ms, buffer),
            _ => None,
        }
    }

    /// Wait requested by a secondary-limit `retry-after` hint.
    pub fn retry_after_wait(&self) -> Option<Duration> {
        self.retry_after
            .filter(|seconds| *seconds > 0)
            .map(Duration::from_secs)
    }

    /// Time until the quota window resets, plus `buffer`.
    ///
    /// `None` when the reset is unknown or already in the past.
    pub fn reset_wait(&self, now_ms: i64, buffer: Duration) -> Option<Duration> {
        let reset_ms = self.reset_at?.checked_mul(1000)?;
        let wait_ms = reset_ms.saturating_sub(now_ms).max(0);
        if wait_ms == 0 {
            return None;
        }
        Some(Duration::from_millis(wait_ms as u64) + buffer)
    }
}
