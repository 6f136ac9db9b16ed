//! Deadline-based periodic timers
//!
//! Time is the caller's monotonic elapsed time (`Duration` since node
//! start). Timers never sleep; the owner asks how many deadlines have
//! passed and the timer rearms past them.

use std::time::Duration;

/// A fixed-period timer with an explicit next deadline
#[derive(Clone, Debug)]
pub struct Periodic {
    interval: Duration,
    next_due: Duration,
}

impl Periodic {
    /// First deadline one interval after `start`
    pub fn new(interval: Duration, start: Duration) -> Self {
        Periodic {
            interval,
            next_due: start + interval,
        }
    }

    /// Next deadline
    pub fn next_deadline(&self) -> Duration {
        self.next_due
    }

    /// Count deadlines passed at `now` and rearm past them.
    ///
    /// Returns the number of elapsed periods and the deadline of the
    /// first one, so callers can reconstruct when each period fell due.
    pub fn fire(&mut self, now: Duration) -> Option<Fired> {
        if now < self.next_due || self.interval.is_zero() {
            return None;
        }

        let first = self.next_due;
        let behind = (now - first).as_nanos() / self.interval.as_nanos();
        let count = u64::try_from(behind).unwrap_or(u64::MAX - 1) + 1;

        self.next_due = first + self.interval.saturating_mul(u32::try_from(count).unwrap_or(u32::MAX));
        Some(Fired {
            count,
            first_deadline: first,
            interval: self.interval,
        })
    }
}

/// Deadlines that fell due in a single `fire` call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fired {
    pub count: u64,
    pub first_deadline: Duration,
    pub interval: Duration,
}

impl Fired {
    /// Deadline of the `index`-th elapsed period (zero-based)
    pub fn deadline(&self, index: u64) -> Duration {
        self.first_deadline + self.interval.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX))
    }
}
