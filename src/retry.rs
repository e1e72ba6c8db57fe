//! Deadline-bounded retry for remote calls.
//!
//! Every remote call made by the reconciler goes through [`retry`]. A call is
//! re-attempted while its failure is classified retryable and the total
//! elapsed time stays within [`RetryPolicy::timeout`] (two minutes by
//! default). A terminal failure aborts on the spot.
//!
//! Delays grow exponentially from `initial_delay` up to `max_delay`, and the
//! last wait is shortened so no sleep runs past the deadline.
//!
//! # Example
//!
//! ```ignore
//! use pagerduty_provider::retry::{retry, RetryPolicy};
//!
//! let user = retry(
//!     &RetryPolicy::default(),
//!     || client.get_user("PXPGF42"),
//!     |err| client.is_retry(err),
//! )
//! .await?;
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Lower bound for any wait between attempts, so a zero delay cannot spin.
pub const MIN_DELAY: Duration = Duration::from_millis(10);

/// Timing parameters for [`retry`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total time budget across all attempts.
    pub timeout: Duration,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor applied to the delay after each retry (clamped to >= 1).
    pub multiplier: f64,
    /// Pause applied after the budget runs out, before the error is returned.
    pub timeout_cooldown: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            timeout_cooldown: None,
        }
    }
}

impl RetryPolicy {
    /// Set the total time budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the delay before the first retry. Raised to [`MIN_DELAY`] if smaller.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the cap on a single delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Pause for `cooldown` after the budget is exhausted.
    ///
    /// Off by default. Older releases of the provider always slept two seconds
    /// here; set `Duration::from_secs(2)` to reproduce that.
    pub fn with_timeout_cooldown(mut self, cooldown: Duration) -> Self {
        self.timeout_cooldown = Some(cooldown);
        self
    }

    fn first_delay(&self) -> Duration {
        self.initial_delay.max(MIN_DELAY)
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let grown = current.as_secs_f64() * self.multiplier.max(1.0);
        Duration::try_from_secs_f64(grown)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
            .max(MIN_DELAY)
    }
}

/// Why [`retry`] gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The operation failed with a non-retryable error.
    Aborted(E),
    /// The time budget ran out; `last` is the final attempt's error.
    TimedOut {
        /// Number of attempts made.
        attempts: u32,
        /// Time spent from the first attempt to giving up.
        elapsed: Duration,
        /// Error returned by the last attempt.
        last: E,
    },
}

impl<E> RetryError<E> {
    /// Unwrap the underlying error, discarding the retry context.
    pub fn into_inner(self) -> E {
        match self {
            Self::Aborted(err) => err,
            Self::TimedOut { last, .. } => last,
        }
    }

    /// Borrow the underlying error.
    pub fn inner(&self) -> &E {
        match self {
            Self::Aborted(err) => err,
            Self::TimedOut { last, .. } => last,
        }
    }

    /// Whether the budget ran out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted(err) => write!(f, "{}", err),
            Self::TimedOut {
                attempts,
                elapsed,
                last,
            } => write!(
                f,
                "gave up after {} attempt(s) in {:?}: {}",
                attempts, elapsed, last
            ),
        }
    }
}

impl<E> std::error::Error for RetryError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner())
    }
}

/// Run `operation` until it succeeds, fails terminally, or the budget runs out.
///
/// `is_retryable` decides, per failure, whether another attempt is allowed.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut operation: F,
    is_retryable: P,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: fmt::Display,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;
    let mut delay = policy.first_delay();

    loop {
        attempts += 1;
        let err = match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(attempts, "operation succeeded after retry");
                }
                return Ok(value);
            },
            Err(err) => err,
        };

        if !is_retryable(&err) {
            debug!(attempts, error = %err, "non-retryable failure");
            return Err(RetryError::Aborted(err));
        }

        let elapsed = started.elapsed();
        if elapsed >= policy.timeout {
            warn!(
                attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                error = %err,
                "retry budget exhausted"
            );
            if let Some(cooldown) = policy.timeout_cooldown {
                sleep(cooldown).await;
            }
            return Err(RetryError::TimedOut {
                attempts,
                elapsed,
                last: err,
            });
        }

        let wait = delay.min(policy.timeout - elapsed);
        debug!(
            attempt = attempts,
            wait_ms = wait.as_millis() as u64,
            error = %err,
            "transient failure, retrying"
        );
        sleep(wait).await;
        delay = policy.next_delay(delay);
    }
}
