//! Retryability classification for Graph calls
//!
//! Transient classes:
//! - HTTP 429, 500, 502, 503, 504 and 509
//! - network timeouts and failures to connect or send
//! - a 401 whose `WWW-Authenticate` header reports `expired_token`
//!   (surfaced as [`GraphError::TokenExpired`]). The client only lets
//!   this through after installing a fresh token from its
//!   [`TokenSource`](crate::auth::TokenSource), so the retry carries it.

use std::time::Duration;

use nimbus_core::pacer::{Failure, MAX_RETRY_AFTER};
use tracing::{debug, warn};

use crate::GraphError;

/// HTTP statuses worth another attempt
pub const RETRY_STATUS_CODES: &[u16] = &[429, 500, 502, 503, 504, 509];

/// Returns true if `err` is transient
pub fn should_retry(err: &GraphError) -> bool {
    match err {
        GraphError::TooManyRequests { .. } | GraphError::TokenExpired => true,
        GraphError::ServerError { status, .. } | GraphError::Api { status, .. } => {
            RETRY_STATUS_CODES.contains(status)
        }
        GraphError::NetworkError(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.is_request()
                || e.status()
                    .is_some_and(|s| RETRY_STATUS_CODES.contains(&s.as_u16()))
        }
        _ => false,
    }
}

/// Wraps `err` for the pacer, carrying any `Retry-After` along
pub fn classify(err: GraphError) -> Failure<GraphError> {
    if should_retry(&err) {
        debug!(error = %err, "Should retry");
        let retry_after = err.retry_after();
        Failure::retry_after(err, retry_after)
    } else {
        Failure::abort(err)
    }
}

/// Parses a `Retry-After` header value
///
/// The header can be either:
/// - an integer number of seconds (e.g. `"30"`)
/// - an HTTP-date (e.g. `"Fri, 31 Dec 2027 23:59:59 GMT"`), as time from now
///
/// Returns `None` if the value is neither, or names a moment in the past.
/// Longer waits are capped at [`MAX_RETRY_AFTER`].
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        let wait = Duration::from_secs(seconds);
        if wait > MAX_RETRY_AFTER {
            warn!(value, "Retry-After beyond the accepted maximum, capping");
            return Some(MAX_RETRY_AFTER);
        }
        return Some(wait);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value) {
        let wait = date.with_timezone(&chrono::Utc) - chrono::Utc::now();
        return wait
            .to_std()
            .ok()
            .map(|d| d.min(MAX_RETRY_AFTER))
            .filter(|d| !d.is_zero());
    }

    warn!(value, "Could not parse Retry-After header");
    None
}
