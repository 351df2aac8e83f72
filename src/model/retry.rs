//! Retry policy for model requests

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::warn;

use crate::error::{ModelError, ModelErrorKind};

static RETRYABLE_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)rate.?limit|overloaded|service.?unavailable",
        r"|upstream.?connect|connection.?(refused|reset)",
    ))
    .expect("retry regex must compile")
});

/// Classify a failure from its HTTP status, or from its text when no
/// response arrived.
///
/// A response status always decides on its own: an invalid request is never
/// retried, whatever the message says.
pub fn classify_http_error(status: Option<u16>, error_text: &str) -> ModelErrorKind {
    let transient = match status {
        Some(status) => matches!(status, 408 | 429 | 500 | 502 | 503 | 504 | 529),
        None => RETRYABLE_TEXT.is_match(error_text),
    };
    if transient {
        ModelErrorKind::Transient
    } else {
        ModelErrorKind::Permanent
    }
}

/// Exponential backoff: `base * 2^attempt`.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.min(16)))
}

/// Run `attempt` until it succeeds, fails permanently, or `max_retries`
/// retries have been spent. The last error is returned unchanged.
pub fn with_retry<F>(
    max_retries: u32,
    base_delay: Duration,
    mut attempt: F,
) -> Result<String, ModelError>
where
    F: FnMut() -> Result<String, ModelError>,
{
    let mut tries = 0;
    loop {
        match attempt() {
            Ok(text) => return Ok(text),
            Err(err) if err.is_transient() && tries < max_retries => {
                let delay = retry_delay(base_delay, tries);
                warn!("{err}; retrying in {}ms ({}/{max_retries})", delay.as_millis(), tries + 1);
                std::thread::sleep(delay);
                tries += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
