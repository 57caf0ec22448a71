//! Call pacing and retry with adaptive exponential backoff
//!
//! A [`RetryPacer`] sits in front of every outbound call of one backend
//! connection. It:
//!
//! - serializes calls, so at most one is in flight per pacer;
//! - spaces consecutive calls by the current sleep interval;
//! - retries attempts the caller classifies as transient, doubling the
//!   interval after each failure (bounded by `max_sleep`);
//! - decays the interval back towards `min_sleep` after each success.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nimbus_core::config::PacerConfig;
//! use nimbus_core::pacer::{Failure, RetryPacer};
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let pacer = RetryPacer::new(PacerConfig::default());
//! let value = pacer
//!     .call(|| async {
//!         // ... issue the request, classify the outcome ...
//!         Ok::<_, Failure<std::io::Error>>(42)
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::PacerConfig;

/// Longest server-requested wait the pacer honours
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

// ============================================================================
// Attempt outcome
// ============================================================================

/// Why an attempt failed, as classified by the caller
#[derive(Debug)]
pub enum Failure<E> {
    /// Transient failure; the pacer may try again
    Retry {
        error: E,
        /// Server-requested minimum wait before the next attempt
        retry_after: Option<Duration>,
    },
    /// Terminal failure; returned to the caller unchanged
    Abort(E),
}

impl<E> Failure<E> {
    /// A transient failure without a server-requested wait
    pub fn retry(error: E) -> Self {
        Failure::Retry {
            error,
            retry_after: None,
        }
    }

    /// A transient failure the server asked us to wait out
    pub fn retry_after(error: E, retry_after: Option<Duration>) -> Self {
        Failure::Retry { error, retry_after }
    }

    /// A terminal failure
    pub fn abort(error: E) -> Self {
        Failure::Abort(error)
    }

    /// Builds a failure from a retryability verdict
    pub fn classify(error: E, should_retry: bool) -> Self {
        if should_retry {
            Failure::retry(error)
        } else {
            Failure::abort(error)
        }
    }

    /// Returns true for the transient variant
    pub fn is_retry(&self) -> bool {
        matches!(self, Failure::Retry { .. })
    }

    /// Unwraps the underlying error
    pub fn into_error(self) -> E {
        match self {
            Failure::Retry { error, .. } | Failure::Abort(error) => error,
        }
    }

    /// Converts the error, keeping the classification
    pub fn map_err<F, O>(self, f: O) -> Failure<F>
    where
        O: FnOnce(E) -> F,
    {
        match self {
            Failure::Retry { error, retry_after } => Failure::Retry {
                error: f(error),
                retry_after,
            },
            Failure::Abort(error) => Failure::Abort(f(error)),
        }
    }
}

impl<E> From<E> for Failure<E> {
    /// Errors converted with `?` are terminal unless classified otherwise
    fn from(error: E) -> Self {
        Failure::Abort(error)
    }
}

// ============================================================================
// Pacer state
// ============================================================================

#[derive(Debug)]
struct PacerState {
    /// Current interval, always within `[min_sleep, max_sleep]`
    sleep: Duration,
    /// Earliest instant the next attempt may start
    next_call: Instant,
    /// Retryable failures since the last success
    consecutive_retries: u32,
}

/// Serializing call scheduler with adaptive exponential backoff
#[derive(Debug)]
pub struct RetryPacer {
    min_sleep: Duration,
    max_sleep: Duration,
    /// `2^(1/decay_constant)`, the divisor applied on success
    decay_factor: f64,
    max_attempts: u32,
    state: Mutex<PacerState>,
    /// Held for the whole duration of a call
    in_flight: tokio::sync::Mutex<()>,
}

impl RetryPacer {
    /// Creates a pacer; out-of-range settings are clamped
    pub fn new(config: PacerConfig) -> Self {
        let min_sleep = config.min_sleep();
        let max_sleep = config.max_sleep().max(min_sleep);
        let decay_constant = config.decay_constant.max(1);
        let max_attempts = config.max_attempts.max(1);

        Self {
            min_sleep,
            max_sleep,
            decay_factor: 2f64.powf(1.0 / f64::from(decay_constant)),
            max_attempts,
            state: Mutex::new(PacerState {
                sleep: min_sleep,
                next_call: Instant::now(),
                consecutive_retries: 0,
            }),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Creates a pacer with the default settings
    pub fn with_defaults() -> Self {
        Self::new(PacerConfig::default())
    }

    /// The current sleep interval
    pub fn current_sleep(&self) -> Duration {
        self.state.lock().sleep
    }

    /// Retryable failures since the last success
    pub fn consecutive_retries(&self) -> u32 {
        self.state.lock().consecutive_retries
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    // ========================================================================
    // Calls
    // ========================================================================

    /// Runs `attempt`, retrying transient failures while budget remains
    ///
    /// Returns the first success, the first terminal error, or the last
    /// transient error once `max_attempts` attempts have failed.
    pub async fn call<T, E, F, Fut>(&self, mut attempt: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure<E>>>,
    {
        let _in_flight = self.in_flight.lock().await;
        let mut attempts = 0;

        loop {
            attempts += 1;
            self.wait_turn().await;

            match attempt().await {
                Ok(value) => {
                    self.on_success();
                    return Ok(value);
                }
                Err(Failure::Abort(error)) => {
                    self.on_success();
                    return Err(error);
                }
                Err(Failure::Retry { error, retry_after }) => {
                    let sleep = self.on_retry(retry_after);
                    if attempts >= self.max_attempts {
                        warn!(attempts, "Retry budget exhausted, giving up");
                        return Err(error);
                    }
                    warn!(
                        attempt = attempts,
                        max_attempts = self.max_attempts,
                        ?sleep,
                        "Transient failure, backing off"
                    );
                }
            }
        }
    }

    /// Runs `attempt` exactly once, still paced and serialized
    pub async fn call_no_retry<T, E, F, Fut>(&self, attempt: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Failure<E>>>,
    {
        let _in_flight = self.in_flight.lock().await;
        self.wait_turn().await;

        match attempt().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(Failure::Abort(error)) => {
                self.on_success();
                Err(error)
            }
            Err(Failure::Retry { error, retry_after }) => {
                self.on_retry(retry_after);
                Err(error)
            }
        }
    }

    // ========================================================================
    // Interval bookkeeping
    // ========================================================================

    async fn wait_turn(&self) {
        let next_call = self.state.lock().next_call;
        if next_call > Instant::now() {
            tokio::time::sleep_until(next_call).await;
        }
    }

    /// Decays the interval towards `min_sleep`
    fn on_success(&self) {
        let mut state = self.state.lock();
        let decayed = state.sleep.div_f64(self.decay_factor).max(self.min_sleep);
        if decayed != state.sleep {
            debug!(old = ?state.sleep, new = ?decayed, "Pacer interval decreased");
        }
        state.sleep = decayed;
        state.consecutive_retries = 0;
        state.next_call = deadline_after(decayed);
    }

    /// Doubles the interval up to `max_sleep`; returns the wait before the
    /// next attempt, which honours `retry_after` even beyond `max_sleep` but
    /// never beyond [`MAX_RETRY_AFTER`]
    fn on_retry(&self, retry_after: Option<Duration>) -> Duration {
        let mut state = self.state.lock();
        state.sleep = state.sleep.saturating_mul(2).min(self.max_sleep);
        state.consecutive_retries += 1;

        let wait = match retry_after {
            Some(requested) if requested > MAX_RETRY_AFTER => {
                warn!(?requested, cap = ?MAX_RETRY_AFTER, "Retry-After too long, capping");
                MAX_RETRY_AFTER.max(state.sleep)
            }
            Some(requested) => requested.max(state.sleep),
            None => state.sleep,
        };
        state.next_call = deadline_after(wait);
        wait
    }
}

/// `now + wait`, saturating far in the future instead of overflowing
fn deadline_after(wait: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(wait)
        .unwrap_or_else(|| now + MAX_RETRY_AFTER)
}
