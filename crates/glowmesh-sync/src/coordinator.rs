//! Coordinator - the node's protocol state machine
//!
//! The coordinator owns the [`NodeState`] and every engine that mutates
//! it. It performs no I/O:
//! - `handle` applies one inbound transport event
//! - `tick` advances the phase clock and the election and mode timers,
//!   returning the broadcasts and transport actions to carry out
//!
//! Faults never surface as errors; each path discards and continues.

use std::time::Duration;

use glowmesh_core::{DisplayMode, LinkStatus, MeshResult, MeshTime, NodeId, Phase, SyncConfig};
use glowmesh_wire::{Envelope, Message, ResyncBeacon};
use tracing::{debug, info};

use crate::{
    AnomalyMonitor, BeaconOutcome, ElectionEngine, ElectionReport, LinkSample, LinkVerdict,
    MembershipView, ModeOutcome, NodeState, Periodic, PhaseClock, Replicator, Synchronizer,
};

/// Transport event, queued by the runtime and drained once per tick
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    /// Fresh membership snapshot (excludes self, may hold orphans)
    MembershipChanged(Vec<NodeId>),
    /// Decoded envelope whose sender the transport has vouched for
    Message(Envelope),
    /// Mesh clock moved by `offset` microseconds
    ClockAdjusted(i32),
    PeerJoined(NodeId),
}

/// Action for the runtime to carry out
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    Broadcast(Envelope),
    /// Tear down and reinitialize the transport
    ResetTransport,
}

/// What an inbound event did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Handled {
    Election(ElectionReport),
    Beacon(BeaconOutcome),
    Mode(ModeOutcome),
    /// Presence-only traffic
    Presence,
    ClockAdjusted,
    PeerJoined,
}

/// Transport readings taken when a periodic election falls due
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MeshObservation {
    pub membership: Vec<NodeId>,
    pub link: LinkStatus,
}

/// Protocol counters
#[derive(Clone, Debug, Default)]
pub struct SyncStats {
    pub elections: u64,
    pub beacons_sent: u64,
    pub beacons_applied: u64,
    pub beacons_discarded: u64,
    pub mode_updates_sent: u64,
    pub mode_updates_applied: u64,
    pub mode_updates_discarded: u64,
    pub phase_wraps: u64,
}

pub struct Coordinator {
    config: SyncConfig,
    state: NodeState,
    elections: ElectionEngine,
    clock: PhaseClock,
    synchronizer: Synchronizer,
    replicator: Replicator,
    monitor: AnomalyMonitor,
    election_timer: Periodic,
    mode_timer: Periodic,
    /// Any message received since the last link sample
    traffic_seen: bool,
    stats: SyncStats,
}

impl Coordinator {
    /// Create a coordinator whose timers start at `now`.
    ///
    /// An initial election over an empty view makes the node its own
    /// controller until the transport reports peers.
    pub fn new(local_id: NodeId, config: SyncConfig, now: Duration) -> MeshResult<Self> {
        config.validate()?;

        let mut coordinator = Coordinator {
            state: NodeState::new(local_id),
            elections: ElectionEngine::new(),
            clock: PhaseClock::new(config.tick_interval, now),
            synchronizer: Synchronizer::new(&config),
            replicator: Replicator::new(),
            monitor: AnomalyMonitor::new(&config),
            election_timer: Periodic::new(config.election_interval, now),
            mode_timer: Periodic::new(config.mode_broadcast_interval, now),
            traffic_seen: false,
            stats: SyncStats::default(),
            config,
        };
        coordinator.elect(Vec::new());
        Ok(coordinator)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    pub fn local_id(&self) -> NodeId {
        self.state.local_id()
    }

    // Renderer view

    pub fn current_display_mode(&self) -> DisplayMode {
        self.state.display_mode()
    }

    pub fn current_phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn is_controller(&self) -> bool {
        self.state.is_controller()
    }

    /// Earliest deadline among the phase, election and mode timers
    pub fn next_deadline(&self) -> Duration {
        self.clock
            .next_deadline()
            .min(self.election_timer.next_deadline())
            .min(self.mode_timer.next_deadline())
    }

    /// Apply one inbound event. `mesh_now` is the local mesh clock reading
    /// used to age beacons.
    pub fn handle(&mut self, event: Inbound, mesh_now: MeshTime) -> Handled {
        match event {
            Inbound::MembershipChanged(snapshot) => Handled::Election(self.elect(snapshot)),
            Inbound::Message(envelope) => {
                self.traffic_seen = true;
                self.on_message(envelope, mesh_now)
            }
            Inbound::ClockAdjusted(offset) => {
                self.monitor
                    .record_clock_adjusted(self.state.anomalies_mut(), offset);
                Handled::ClockAdjusted
            }
            Inbound::PeerJoined(id) => {
                info!(peer = %id, "peer joined the mesh");
                Handled::PeerJoined
            }
        }
    }

    fn on_message(&mut self, envelope: Envelope, mesh_now: MeshTime) -> Handled {
        if let Some(beacon) = envelope.as_beacon() {
            return self.on_beacon(beacon, mesh_now);
        }

        match envelope.message {
            Message::ModeUpdate(mode) => {
                let outcome = self
                    .replicator
                    .on_mode_update(&mut self.state, envelope.sender, mode);
                match outcome {
                    ModeOutcome::Applied { .. } => self.stats.mode_updates_applied += 1,
                    ModeOutcome::Unchanged => {}
                    _ => self.stats.mode_updates_discarded += 1,
                }
                Handled::Mode(outcome)
            }
            // Hello only proves presence
            _ => Handled::Presence,
        }
    }

    fn on_beacon(&mut self, beacon: ResyncBeacon, mesh_now: MeshTime) -> Handled {
        let outcome = self
            .synchronizer
            .on_beacon(&mut self.state, &self.monitor, beacon, mesh_now);
        if outcome.corrected() {
            self.stats.beacons_applied += 1;
        } else {
            self.stats.beacons_discarded += 1;
        }
        Handled::Beacon(outcome)
    }

    /// Advance time to `now`.
    ///
    /// `observe` is only called when the periodic election falls due.
    pub fn tick<F>(&mut self, now: Duration, mesh_now: MeshTime, observe: F) -> Vec<Outbound>
    where
        F: FnOnce() -> MeshObservation,
    {
        let mut actions = Vec::new();

        let advance = self.clock.advance(&mut self.state, now);
        self.stats.phase_wraps += advance.wraps;
        if let Some(lag) = advance.last_wrap_lag {
            if let Some(beacon) = self.synchronizer.on_wrap(&self.state, mesh_now - lag) {
                self.stats.beacons_sent += 1;
                actions.push(Outbound::Broadcast(beacon.into()));
            }
        }

        if self.election_timer.fire(now).is_some() {
            let observation = observe();
            self.elect(observation.membership);

            let sample = LinkSample {
                status: observation.link,
                traffic_seen: std::mem::take(&mut self.traffic_seen),
            };
            if self.monitor.sample_link(self.state.anomalies_mut(), sample) == LinkVerdict::ResetTransport {
                actions.push(Outbound::ResetTransport);
            }
        }

        if self.mode_timer.fire(now).is_some() {
            if let Some(envelope) = self.replicator.announce(&self.state, mesh_now) {
                self.stats.mode_updates_sent += 1;
                actions.push(Outbound::Broadcast(envelope));
            }
        }

        actions
    }

    fn elect(&mut self, snapshot: Vec<NodeId>) -> ElectionReport {
        let view = MembershipView::from_snapshot(snapshot);
        self.monitor.record_orphans(self.state.anomalies_mut(), &view);
        self.stats.elections += 1;
        let report = self.elections.run(&mut self.state, view);
        debug!(
            role = ?self.state.role(),
            mode = self.state.display_mode().name(),
            "election applied"
        );
        report
    }
}
