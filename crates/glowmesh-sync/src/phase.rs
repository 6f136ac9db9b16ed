//! Phase clock - drives the 8-bit animation phase off a fixed tick

use std::time::Duration;

use glowmesh_core::Phase;

use crate::{NodeState, Periodic};

/// Result of advancing the phase clock
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PhaseAdvance {
    /// Ticks applied
    pub steps: u64,
    /// Wraps through zero among those ticks
    pub wraps: u64,
    /// How long before `now` the most recent wrap fell due
    pub last_wrap_lag: Option<Duration>,
}

/// Advances the node's phase once per tick interval of elapsed time
#[derive(Clone, Debug)]
pub struct PhaseClock {
    timer: Periodic,
}

impl PhaseClock {
    pub fn new(tick_interval: Duration, start: Duration) -> Self {
        PhaseClock {
            timer: Periodic::new(tick_interval, start),
        }
    }

    pub fn next_deadline(&self) -> Duration {
        self.timer.next_deadline()
    }

    /// Apply every tick that fell due by `now`.
    ///
    /// A stalled loop catches up in one call; only the last wrap matters
    /// to the caller, reported with its lag so a beacon can be stamped
    /// with the moment the wrap actually happened.
    pub fn advance(&mut self, state: &mut NodeState, now: Duration) -> PhaseAdvance {
        let Some(fired) = self.timer.fire(now) else {
            return PhaseAdvance::default();
        };

        let start = state.phase().value() as u64;
        let total = start + fired.count;
        let wraps = total / 256;
        let end = Phase::from_ticks(total);

        // The last wrap is `end` ticks before the final one
        let last_wrap_lag = (wraps > 0).then(|| {
            let index = fired.count - 1 - end.value() as u64;
            now.saturating_sub(fired.deadline(index))
        });

        state.set_phase(end);

        PhaseAdvance {
            steps: fired.count,
            wraps,
            last_wrap_lag,
        }
    }
}
