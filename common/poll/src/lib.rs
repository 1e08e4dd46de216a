// Licensed under the Apache-2.0 license

//! Bounded polling helpers.
//!
//! [`PollPolicy`] bounds a poll loop by both an attempt ceiling and a
//! wall-clock deadline measured on the monotonic clock, so a slow or stuck
//! condition terminates the same way regardless of CPU speed.

use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Limits applied to a poll loop. Whichever bound is hit first ends the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Maximum number of times the condition is evaluated.
    pub max_attempts: u32,
    /// Delay between two evaluations.
    pub interval: Duration,
    /// Deadline measured from the first evaluation.
    pub timeout: Duration,
}

/// Bookkeeping returned by a finished poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollStats {
    pub attempts: u32,
    pub elapsed: Duration,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError<E> {
    #[error("condition not met after {} attempts ({:?})", .0.attempts, .0.elapsed)]
    Exhausted(PollStats),
    #[error("poll aborted: {0}")]
    Aborted(E),
}

impl PollPolicy {
    pub const fn new(max_attempts: u32, interval: Duration, timeout: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            timeout,
        }
    }

    /// Evaluates `condition` until it returns `Ok(true)`.
    ///
    /// The condition is evaluated at least once. An `Err` from the condition
    /// stops the loop immediately and is returned as [`PollError::Aborted`].
    pub fn run<E, F>(&self, mut condition: F) -> Result<PollStats, PollError<E>>
    where
        F: FnMut() -> Result<bool, E>,
    {
        let start = Instant::now();
        let max_attempts = self.max_attempts.max(1);
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if condition().map_err(PollError::Aborted)? {
                return Ok(PollStats {
                    attempts,
                    elapsed: start.elapsed(),
                });
            }
            let elapsed = start.elapsed();
            if attempts >= max_attempts || elapsed >= self.timeout {
                return Err(PollError::Exhausted(PollStats { attempts, elapsed }));
            }
            if !self.interval.is_zero() {
                thread::sleep(self.interval);
            }
        }
    }
}

/// Polls `condition` every `interval` until it returns `Ok(true)` or `timeout`
/// elapses.
pub fn poll_until<F>(timeout: Duration, interval: Duration, condition: F) -> anyhow::Result<()>
where
    F: FnMut() -> anyhow::Result<bool>,
{
    PollPolicy::new(u32::MAX, interval, timeout)
        .run(condition)
        .map(|_| ())
        .map_err(|e| match e {
            PollError::Exhausted(stats) => {
                anyhow::anyhow!("timed out after {:?} ({} polls)", timeout, stats.attempts)
            }
            PollError::Aborted(err) => err,
        })
}
