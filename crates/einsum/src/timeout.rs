//! Deadlines and cooperative timeout probes
//!
//! Every evaluation carries an absolute monotonic deadline. Checking the
//! clock on every binding would dominate tight join loops, so probes are
//! batched: the clock is read once per [`PROBE_INTERVAL`] ticks and at
//! every recursion entry. Cancellation is cooperative; there are no forced
//! aborts.

use std::time::{Duration, Instant};

/// Number of ticks between clock reads
pub const PROBE_INTERVAL: u32 = 500;

/// Raised when a deadline has passed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline exceeded")]
pub struct DeadlineExceeded;

/// An absolute monotonic deadline; `never` means unbounded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never fires
    pub fn never() -> Self {
        Self { at: None }
    }

    /// A deadline at an absolute time point
    pub fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    /// A deadline the given duration from now
    pub fn from_now(timeout: Duration) -> Self {
        Self {
            at: Some(Instant::now() + timeout),
        }
    }

    /// The absolute time point, if bounded
    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// Check whether the deadline has passed
    pub fn expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() > at)
    }

    /// Error out if the deadline has passed
    pub fn check(&self) -> Result<(), DeadlineExceeded> {
        if self.expired() {
            Err(DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}

/// Batched deadline probe shared by one evaluation
///
/// [`TimeoutProbe::tick`] is called on every iteration step and reads the
/// clock every [`PROBE_INTERVAL`]th call; [`TimeoutProbe::check_now`] reads
/// it unconditionally and is meant for recursion entries and flush points.
#[derive(Clone, Debug)]
pub struct TimeoutProbe {
    deadline: Deadline,
    ticks: u32,
}

impl TimeoutProbe {
    /// Create a probe for the given deadline
    pub fn new(deadline: Deadline) -> Self {
        Self { deadline, ticks: 0 }
    }

    /// The deadline this probe watches
    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    /// Count one step; checks the clock every [`PROBE_INTERVAL`]th call
    pub fn tick(&mut self) -> Result<(), DeadlineExceeded> {
        self.ticks += 1;
        if self.ticks >= PROBE_INTERVAL {
            self.ticks = 0;
            self.deadline.check()
        } else {
            Ok(())
        }
    }

    /// Check the clock immediately
    pub fn check_now(&self) -> Result<(), DeadlineExceeded> {
        self.deadline.check()
    }
}
