//! Transport-level policies: retries, standard headers, timeouts.

use std::time::Duration;

/// Default connection timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read/response timeout (60 seconds).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Header carrying the generated client request id.
pub const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Header selecting the language of localized response strings.
pub const ACCEPT_LANGUAGE_HEADER: &str = "accept-language";

/// Default `User-Agent` for clients that do not set their own.
pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Throttling (429) and transient gateway or server failures.
#[inline]
pub fn is_retriable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Configuration for automatic retry behavior on transient service errors.
///
/// Retries are disabled unless a policy is set on the client builder. Transport
/// failures are never retried; only retriable status codes are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Exponential backoff with jitter.
    pub const fn exponential(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    /// Delay before retry number `attempt` (0-based), with ±25% jitter.
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.saturating_mul(2_u32.saturating_pow(attempt));
        let jitter = 0.75 + fastrand::f64() * 0.5;
        base.mul_f64(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Generate a fresh client request id.
pub(crate) fn new_client_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_statuses_are_retried() {
        let retried: Vec<u16> = (100..600).filter(|s| is_retriable_status(*s)).collect();
        assert_eq!(retried, vec![429, 500, 502, 503, 504]);
    }

    #[test]
    fn default_policy_does_not_retry() {
        assert_eq!(RetryPolicy::default().max_retries, 0);
    }

    #[test]
    fn backoff_grows_exponentially_within_jitter() {
        let policy = RetryPolicy::exponential(3, Duration::from_millis(100));
        for attempt in 0..3 {
            let base = 100.0 * 2_f64.powi(attempt as i32);
            let delay = policy.backoff(attempt).as_secs_f64() * 1000.0;
            assert!(delay >= base * 0.75 - 0.001, "attempt {attempt}: {delay}ms");
            assert!(delay <= base * 1.25 + 0.001, "attempt {attempt}: {delay}ms");
        }
    }

    #[test]
    fn client_request_ids_are_unique_uuids() {
        let a = new_client_request_id();
        let b = new_client_request_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        assert!(uuid::Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn default_user_agent_names_crate() {
        assert!(DEFAULT_USER_AGENT.starts_with("azure_cognitive_core/"));
    }
}
