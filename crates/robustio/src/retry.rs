//! Bounded-time retry engine
//!
//! Drives an attempt closure until it succeeds, fails permanently, or the
//! time budget runs out. Sleeps grow by a random jitter drawn from
//! `[0, current sleep)`, roughly doubling on average, which spreads out
//! concurrent retriers contending for the same file.

use std::thread;
use std::time::{Duration, Instant};

use backoff::backoff::Backoff;
use backoff::{Clock, SystemClock};
use rand::Rng;
use rand::rngs::ThreadRng;
use serde::{Deserialize, Serialize};

use crate::{PlatformError, PlatformErrorCode};

/// Timing parameters of a retry session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// First sleep after a retryable failure.
    #[serde(rename = "initial_sleep_ms", with = "millis")]
    pub initial_sleep: Duration,
    /// Total time a session may spend retrying, measured from the first
    /// retryable failure.
    #[serde(rename = "budget_ms", with = "millis")]
    pub budget: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_INITIAL_SLEEP: Duration = Duration::from_millis(1);
    pub const DEFAULT_BUDGET: Duration = Duration::from_millis(500);

    /// A policy that never sleeps: every failure is reported immediately.
    pub fn no_retry() -> Self {
        Self {
            initial_sleep: Self::DEFAULT_INITIAL_SLEEP,
            budget: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_sleep: Self::DEFAULT_INITIAL_SLEEP,
            budget: Self::DEFAULT_BUDGET,
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Jittered sleep schedule bounded by a total time budget.
///
/// The clock starts on the first call to [`Backoff::next_backoff`], not when
/// the schedule is created, so a session whose first attempt settles the
/// outcome never reads the clock.
pub struct JitteredBackoff<'a, R, C> {
    initial_sleep: Duration,
    next_sleep: Duration,
    budget: Duration,
    start: Option<Instant>,
    rng: &'a mut R,
    clock: &'a C,
}

impl<'a, R: Rng, C: Clock> JitteredBackoff<'a, R, C> {
    pub fn new(policy: &RetryPolicy, rng: &'a mut R, clock: &'a C) -> Self {
        Self {
            initial_sleep: policy.initial_sleep,
            next_sleep: policy.initial_sleep,
            budget: policy.budget,
            start: None,
            rng,
            clock,
        }
    }

    /// The sleep the next call would hand out, budget permitting.
    pub fn upcoming(&self) -> Duration {
        self.next_sleep
    }
}

impl<R: Rng, C: Clock> Backoff for JitteredBackoff<'_, R, C> {
    fn reset(&mut self) {
        self.next_sleep = self.initial_sleep;
        self.start = None;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        let now = self.clock.now();
        let start = *self.start.get_or_insert(now);
        if now.saturating_duration_since(start) + self.next_sleep >= self.budget {
            return None;
        }

        let sleep = self.next_sleep;
        self.next_sleep += jitter(self.rng, sleep);
        Some(sleep)
    }
}

/// Uniform random duration in `[0, upper)`; zero when `upper` is zero.
fn jitter<R: Rng>(rng: &mut R, upper: Duration) -> Duration {
    let nanos = u64::try_from(upper.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rng.gen_range(0..nanos))
}

/// The most diagnostic error seen during a session.
///
/// An error with a platform code replaces the current best when no code has
/// been recorded yet or its code is numerically lower. An error without a
/// code is only kept if it was the first one.
#[derive(Debug)]
struct BestError<E> {
    err: E,
    code: Option<PlatformErrorCode>,
}

impl<E: PlatformError> BestError<E> {
    fn new(err: E) -> Self {
        let code = err.platform_code();
        Self { err, code }
    }

    fn offer(self, err: E) -> Self {
        match err.platform_code() {
            Some(code) if self.code.is_none_or(|lowest| code < lowest) => Self {
                err,
                code: Some(code),
            },
            _ => self,
        }
    }

    fn into_error(self) -> E {
        self.err
    }
}

/// Retry engine with an injectable jitter source and clock.
pub struct Retrier<R = ThreadRng, C = SystemClock> {
    policy: RetryPolicy,
    rng: R,
    clock: C,
}

impl Retrier {
    /// A retrier using the thread-local RNG and the system clock.
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_parts(policy, rand::thread_rng(), SystemClock::default())
    }
}

impl<R: Rng, C: Clock> Retrier<R, C> {
    pub fn with_parts(policy: RetryPolicy, rng: R, clock: C) -> Self {
        Self { policy, rng, clock }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `attempt` until it succeeds, fails permanently, or the budget is
    /// exhausted.
    ///
    /// A [`backoff::Error::Permanent`] result is returned as-is after that
    /// attempt. When the budget runs out, the error with the lowest platform
    /// code observed during the session is returned, which is not
    /// necessarily the last one.
    pub fn retry<T, E, F>(&mut self, mut attempt: F) -> Result<T, E>
    where
        E: PlatformError,
        F: FnMut() -> Result<T, backoff::Error<E>>,
    {
        let mut schedule = JitteredBackoff::new(&self.policy, &mut self.rng, &self.clock);
        let mut best: Option<BestError<E>> = None;

        loop {
            let err = match attempt() {
                Ok(value) => return Ok(value),
                Err(backoff::Error::Permanent(err)) => return Err(err),
                Err(backoff::Error::Transient { err, .. }) => err,
            };

            let current = match best.take() {
                Some(previous) => previous.offer(err),
                None => BestError::new(err),
            };

            match schedule.next_backoff() {
                Some(sleep) => {
                    best = Some(current);
                    thread::sleep(sleep);
                }
                None => return Err(current.into_error()),
            }
        }
    }
}

/// Run `attempt` under `policy` with the default jitter source and clock.
pub fn retry<T, E, F>(policy: RetryPolicy, attempt: F) -> Result<T, E>
where
    E: PlatformError,
    F: FnMut() -> Result<T, backoff::Error<E>>,
{
    Retrier::new(policy).retry(attempt)
}
