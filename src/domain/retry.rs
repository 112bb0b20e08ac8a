//! Bounded retry with linear backoff and jitter around external calls.
//!
//! [`ResilientCaller::call`] never returns an error to its caller: the
//! outcome is a [`CallOutcome`] that keeps "dependency unavailable" distinct
//! from a successful (possibly empty) result. Every call gets its own attempt
//! counter; nothing is shared between invocations.

use std::time::Duration;

use rand::Rng;

use crate::domain::error::TraderError;
use crate::ports::clock_port::Sleeper;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Added once per earlier retry.
    pub step: Duration,
    /// Upper bound of the uniform random delay added to every wait.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            step: Duration::from_secs(1),
            jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `retry`, counted from 0: the first retry
    /// waits `base_delay` plus jitter. `unit` is in `[0, 1)`.
    pub fn delay_for(&self, retry: u32, unit: f64) -> Duration {
        self.base_delay + self.step * retry + self.jitter.mul_f64(unit.clamp(0.0, 1.0))
    }
}

#[derive(Debug)]
pub enum CallOutcome<T> {
    Ready(T),
    /// Every attempt failed with a transient error.
    Unavailable { attempts: u32, last_error: TraderError },
    /// The call failed with an error retrying cannot fix.
    Rejected(TraderError),
}

impl<T> CallOutcome<T> {
    /// Convert to a `Result`, mapping exhaustion to `DependencyUnavailable`.
    pub fn into_result(self, operation: &str) -> Result<T, TraderError> {
        match self {
            CallOutcome::Ready(v) => Ok(v),
            CallOutcome::Unavailable {
                attempts,
                last_error,
            } => Err(TraderError::DependencyUnavailable {
                operation: operation.to_string(),
                attempts,
                reason: last_error.to_string(),
            }),
            CallOutcome::Rejected(err) => Err(err),
        }
    }
}

pub struct ResilientCaller<'a> {
    policy: RetryPolicy,
    sleeper: &'a dyn Sleeper,
}

impl<'a> ResilientCaller<'a> {
    pub fn new(policy: RetryPolicy, sleeper: &'a dyn Sleeper) -> Self {
        Self { policy, sleeper }
    }

    pub fn call<T, F>(&self, operation: &str, mut op: F) -> CallOutcome<T>
    where
        F: FnMut() -> Result<T, TraderError>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let err = match op() {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(operation, attempt, "call succeeded after retry");
                    }
                    return CallOutcome::Ready(value);
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                tracing::warn!(operation, attempt, error = %err, "call rejected, not retrying");
                return CallOutcome::Rejected(err);
            }

            if attempt >= max_attempts {
                tracing::warn!(
                    operation,
                    attempts = attempt,
                    error = %err,
                    "call unavailable after retries"
                );
                return CallOutcome::Unavailable {
                    attempts: attempt,
                    last_error: err,
                };
            }

            let delay = self
                .policy
                .delay_for(attempt - 1, rand::thread_rng().gen_range(0.0..1.0));
            tracing::debug!(
                operation,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "call failed, retrying"
            );
            self.sleeper.sleep(delay);
        }
    }
}
