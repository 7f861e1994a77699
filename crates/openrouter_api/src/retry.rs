use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

/// Maximum retry attempts after an initial request attempt.
pub const MAX_RETRIES: u32 = 2;
/// Base delay before the first retry.
pub const BASE_DELAY_MS: u64 = 500;

fn retryable_message_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)rate.?limit|overloaded|service.?unavailable|upstream|connection.?(refused|reset)|temporarily")
            .expect("retry regex must compile")
    })
}

/// Retry policy for non-success statuses. Authentication and payment
/// failures are never retried.
pub fn is_retryable_http_error(status: u16, error_text: &str) -> bool {
    if matches!(status, 401 | 402 | 403) {
        return false;
    }

    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
        || retryable_message_regex().is_match(error_text)
}

/// Retry policy for transport failures that never produced a status.
pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// Compute exponential backoff delay for a retry attempt.
pub fn retry_delay(attempt: u32) -> Duration {
    let exponent = attempt.min(16);
    Duration::from_millis(BASE_DELAY_MS.saturating_mul(2u64.saturating_pow(exponent)))
}
