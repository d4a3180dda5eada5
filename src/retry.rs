//! Retry policy for transient failures.
//!
//! The policy is a pure function from "what happened on attempt `n`" to "what
//! to do next". The async and blocking clients both drive the same
//! [`RetryPolicy`]; they only differ in how they wait out the backoff.
//!
//! Every endpoint of the API is a read-only computation or lookup, so any
//! request, `POST` included, is retried freely. That assumption must be
//! revisited if a mutating endpoint is ever added.

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// Status codes treated as transient and retried.
pub const RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Returns `true` if `status` is in [`RETRYABLE_STATUS_CODES`].
pub fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUS_CODES.contains(&status.as_u16())
}

/// Exponential backoff: `initial * 2^attempt`, capped at `max`.
///
/// # Examples
///
/// ```
/// use neo_tariff::retry::Backoff;
/// use std::time::Duration;
///
/// let backoff = Backoff::default();
/// assert_eq!(backoff.delay(0), Duration::from_millis(500));
/// assert_eq!(backoff.delay(1), Duration::from_secs(1));
/// assert_eq!(backoff.delay(10), Duration::from_secs(8));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay after the first failed attempt.
    pub initial: Duration,
    /// Upper bound for any computed delay.
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(8),
        }
    }
}

impl Backoff {
    /// Returns the computed delay after the failed attempt `attempt` (0-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(62) as i32;
        let seconds = self.initial.as_secs_f64() * 2f64.powi(exponent);
        Duration::try_from_secs_f64(seconds)
            .unwrap_or(self.max)
            .min(self.max)
    }
}

/// What one attempt produced, as far as the policy is concerned.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    /// The server answered.
    Response {
        /// The response status.
        status: StatusCode,
        /// The response headers, consulted for `Retry-After`.
        headers: &'a HeaderMap,
    },
    /// The request did not complete at the network level.
    NetworkError,
}

/// What the transport should do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Hand the response (or the network error) back to the caller.
    Stop,
    /// Wait for the given delay, then try again.
    RetryAfter(Duration),
}

/// Bounded retry with exponential backoff.
///
/// Total attempts are `max_retries + 1`; `max_retries = 0` disables retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Backoff between attempts.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Backoff::default(),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the default backoff.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Total number of attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Decides what follows attempt `attempt` (0-indexed).
    ///
    /// Responses with a non-retryable status stop immediately. Retryable
    /// statuses and network errors are retried while attempts remain; once
    /// they run out the transport returns the last response as-is or raises a
    /// connection failure for the last network error.
    pub fn decide(&self, attempt: u32, outcome: Outcome<'_>) -> Decision {
        let headers = match outcome {
            Outcome::Response { status, headers } => {
                if !is_retryable_status(status) {
                    return Decision::Stop;
                }
                Some(headers)
            }
            Outcome::NetworkError => None,
        };

        if attempt >= self.max_retries {
            return Decision::Stop;
        }

        Decision::RetryAfter(self.backoff_for(attempt, headers))
    }

    /// Backoff after the failed attempt `attempt`, honoring a larger
    /// `Retry-After` hint from `headers`.
    ///
    /// # Examples
    ///
    /// ```
    /// use neo_tariff::retry::RetryPolicy;
    /// use http::HeaderMap;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.backoff_for(0, None), Duration::from_millis(500));
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("retry-after", "5".parse().unwrap());
    /// assert_eq!(policy.backoff_for(0, Some(&headers)), Duration::from_secs(5));
    /// ```
    pub fn backoff_for(&self, attempt: u32, headers: Option<&HeaderMap>) -> Duration {
        let computed = self.backoff.delay(attempt);
        match headers.and_then(retry_after) {
            Some(hint) => computed.max(hint),
            None => computed,
        }
    }
}

/// Parses a `Retry-After` header given in seconds (integer or fractional).
///
/// Anything else, HTTP dates included, is ignored.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = headers.get(http::header::RETRY_AFTER)?.to_str().ok()?;
    let seconds = header.trim().parse::<f64>().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}
