//! Synchronizer - keeps follower phases in step with the controller
//!
//! Controller side: a beacon goes out every time the phase wraps.
//! Receiving side, in order:
//! 1. Sender must be the known controller (and not ourselves)
//! 2. Age = local mesh time - stamp, wrapping
//! 3. Negative signed age is a clock inversion; non-negative clears the streak
//! 4. Ages beyond the staleness bound are dropped
//! 5. Phases near their own wrap point sit in the dead-band and are left alone
//! 6. Otherwise the phase is set to the controller's estimated position

use std::time::Duration;

use glowmesh_core::{CorrectionPolicy, MeshTime, MessageAge, NodeId, Phase, SyncConfig};
use glowmesh_wire::ResyncBeacon;
use tracing::{debug, trace};

use crate::{AnomalyMonitor, NodeState};

/// Why a beacon did or did not move the local phase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BeaconOutcome {
    Corrected { from: Phase, to: Phase },
    /// Local phase is near its own wrap; correcting would flicker
    DeadBand { phase: Phase },
    Stale { age: MessageAge },
    /// Stamp ahead of the local clock; `signalled` if this crossed the threshold
    ClockInversion { consecutive: u32, signalled: bool },
    UnknownSender { sender: NodeId, controller: NodeId },
    Loopback,
}

impl BeaconOutcome {
    pub fn corrected(&self) -> bool {
        matches!(self, BeaconOutcome::Corrected { .. })
    }
}

/// Beacon emission and reception
#[derive(Clone, Debug)]
pub struct Synchronizer {
    tick_interval: Duration,
    max_message_age_us: u32,
    dead_band: (u8, u8),
    correction: CorrectionPolicy,
}

impl Synchronizer {
    pub fn new(config: &SyncConfig) -> Self {
        Synchronizer {
            tick_interval: config.tick_interval,
            max_message_age_us: config.max_message_age_us,
            dead_band: config.dead_band,
            correction: config.correction,
        }
    }

    /// Beacon to broadcast for a wrap stamped at `wrapped_at`, if this
    /// node is the controller and has someone to tell
    pub fn on_wrap(&self, state: &NodeState, wrapped_at: MeshTime) -> Option<ResyncBeacon> {
        if !state.is_controller() || state.membership().is_empty() {
            return None;
        }
        trace!(at = ?wrapped_at, "phase wrapped, emitting beacon");
        Some(ResyncBeacon::new(state.local_id(), wrapped_at))
    }

    /// True when `phase` is far enough from its wrap point to be corrected
    pub fn outside_dead_band(&self, phase: Phase) -> bool {
        let distance = phase.distance_to_wrap();
        let (low, high) = self.dead_band;
        low < distance && distance < high
    }

    /// Phase the controller is estimated to have reached, `age` after its wrap
    pub fn estimate_phase(&self, age: MessageAge) -> Phase {
        match self.correction {
            CorrectionPolicy::Proportional => Phase::from_ticks(age.as_ticks(self.tick_interval)),
            CorrectionPolicy::HardReset => Phase::ZERO,
        }
    }

    pub fn on_beacon(
        &self,
        state: &mut NodeState,
        monitor: &AnomalyMonitor,
        beacon: ResyncBeacon,
        now: MeshTime,
    ) -> BeaconOutcome {
        if beacon.sender == state.local_id() {
            return BeaconOutcome::Loopback;
        }
        let controller = state.known_controller();
        if beacon.sender != controller {
            debug!(sender = %beacon.sender, %controller, "beacon from non-controller dropped");
            return BeaconOutcome::UnknownSender {
                sender: beacon.sender,
                controller,
            };
        }

        let age = now.age_since(beacon.sent_at);
        if age.is_inverted() {
            let signalled = monitor.record_inversion(state.anomalies_mut());
            let consecutive = state.anomalies().clock_inversion_count;
            debug!(ahead_us = -(age.signed_micros() as i64), consecutive, "beacon stamped in the future");
            return BeaconOutcome::ClockInversion {
                consecutive,
                signalled,
            };
        }
        monitor.clear_inversions(state.anomalies_mut());

        if age.as_micros() > self.max_message_age_us {
            debug!(age_us = age.as_micros(), "stale beacon dropped");
            return BeaconOutcome::Stale { age };
        }

        let from = state.phase();
        if !self.outside_dead_band(from) {
            trace!(phase = from.value(), "beacon inside dead-band");
            return BeaconOutcome::DeadBand { phase: from };
        }

        let to = self.estimate_phase(age);
        state.set_phase(to);
        debug!(from = from.value(), to = to.value(), age_us = age.as_micros(), "phase corrected");
        BeaconOutcome::Corrected { from, to }
    }
}
