//! glowmesh Node - Runtime loop implementation

use std::time::{Duration, Instant};

use glowmesh_core::{DisplayMode, MeshError, MeshResult, NodeId, Phase, SyncConfig};
use glowmesh_sync::{Coordinator, Handled, Inbound, MeshObservation, Outbound};
use glowmesh_transport::{MeshEvent, MeshTransport};
use glowmesh_wire::Envelope;
use tracing::{debug, warn};

use crate::{FrameView, Renderer};

/// Node configuration
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub sync: SyncConfig,
    /// Transport events drained per tick at most
    pub max_events_per_tick: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            sync: SyncConfig::default(),
            max_events_per_tick: 256,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RuntimeStats {
    pub ticks: u64,
    pub events_in: u64,
    pub messages_in: u64,
    pub malformed_dropped: u64,
    pub sender_mismatches: u64,
    pub broadcasts_out: u64,
    pub broadcast_failures: u64,
    pub transport_resets: u64,
    pub last_tick_duration: Duration,
}

/// Decode a datagram and check it against the sender the transport saw
pub fn decode_from(from: NodeId, payload: &[u8]) -> MeshResult<Envelope> {
    let envelope = Envelope::decode(payload)?;
    if envelope.sender != from {
        return Err(MeshError::SenderMismatch {
            transport: from,
            envelope: envelope.sender,
        });
    }
    Ok(envelope)
}

/// glowmesh Node - one mesh participant
pub struct Node<T, R> {
    transport: T,
    renderer: R,
    coordinator: Coordinator,
    config: NodeConfig,
    started: Instant,
    stats: RuntimeStats,
}

impl<T: MeshTransport, R: Renderer> Node<T, R> {
    /// Create a node over an attached transport.
    ///
    /// Runs an election on whatever membership the transport already sees.
    pub fn new(transport: T, renderer: R, config: NodeConfig) -> MeshResult<Self> {
        let mut coordinator = Coordinator::new(transport.local_id(), config.sync.clone(), Duration::ZERO)?;
        coordinator.handle(
            Inbound::MembershipChanged(transport.current_membership()),
            transport.mesh_now(),
        );

        Ok(Node {
            transport,
            renderer,
            coordinator,
            config,
            started: Instant::now(),
            stats: RuntimeStats::default(),
        })
    }

    pub fn local_id(&self) -> NodeId {
        self.coordinator.local_id()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn current_display_mode(&self) -> DisplayMode {
        self.coordinator.current_display_mode()
    }

    pub fn current_phase(&self) -> Phase {
        self.coordinator.current_phase()
    }

    pub fn is_controller(&self) -> bool {
        self.coordinator.is_controller()
    }

    pub fn frame(&self) -> FrameView {
        FrameView {
            node: self.local_id(),
            mode: self.current_display_mode(),
            phase: self.current_phase(),
            accent: self.is_controller(),
        }
    }

    /// Time since start at which the next timer falls due
    pub fn next_deadline(&self) -> Duration {
        self.coordinator.next_deadline()
    }

    /// Instant at which the next timer falls due
    pub fn next_wakeup(&self) -> Instant {
        self.started + self.next_deadline()
    }

    /// Run one tick against the wall clock
    pub fn tick(&mut self) {
        let now = self.started.elapsed();
        self.tick_at(now);
    }

    /// Run one tick at `now` (elapsed since node start)
    pub fn tick_at(&mut self, now: Duration) {
        let start = Instant::now();
        self.stats.ticks += 1;

        // Stage 1: transport upkeep, then drain its events
        self.transport.maintain();
        for _ in 0..self.config.max_events_per_tick {
            let Some(event) = self.transport.poll_event() else {
                break;
            };
            self.ingest(event);
        }

        // Stage 2: timers
        let mesh_now = self.transport.mesh_now();
        let transport = &self.transport;
        let actions = self.coordinator.tick(now, mesh_now, || MeshObservation {
            membership: transport.current_membership(),
            link: transport.link_status(),
        });

        // Stage 3: actions
        for action in actions {
            self.execute(action);
        }

        // Stage 4: render
        let frame = self.frame();
        self.renderer.render(&frame);

        self.stats.last_tick_duration = start.elapsed();
    }

    fn ingest(&mut self, event: MeshEvent) {
        self.stats.events_in += 1;
        let mesh_now = self.transport.mesh_now();

        let inbound = match event {
            MeshEvent::MembershipChanged => Inbound::MembershipChanged(self.transport.current_membership()),
            MeshEvent::ClockAdjusted(offset) => Inbound::ClockAdjusted(offset),
            MeshEvent::PeerJoined(id) => Inbound::PeerJoined(id),
            MeshEvent::Received { from, payload } => {
                self.stats.messages_in += 1;
                match decode_from(from, &payload) {
                    Ok(envelope) => Inbound::Message(envelope),
                    Err(e) => {
                        if matches!(e, MeshError::SenderMismatch { .. }) {
                            self.stats.sender_mismatches += 1;
                        } else {
                            self.stats.malformed_dropped += 1;
                        }
                        debug!(%from, error = %e, "datagram dropped");
                        return;
                    }
                }
            }
        };

        if let Handled::Election(report) = self.coordinator.handle(inbound, mesh_now) {
            debug!(controller = %report.election.controller, "membership change handled");
        }
    }

    fn execute(&mut self, action: Outbound) {
        match action {
            Outbound::Broadcast(envelope) => match self.transport.broadcast(&envelope) {
                Ok(()) => self.stats.broadcasts_out += 1,
                Err(e) => {
                    self.stats.broadcast_failures += 1;
                    debug!(kind = ?envelope.kind(), error = %e, "broadcast failed");
                }
            },
            Outbound::ResetTransport => {
                self.stats.transport_resets += 1;
                if let Err(e) = self.transport.reset() {
                    warn!(error = %e, "transport reset failed, will retry");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LastFrame;
    use bytes::Bytes;
    use glowmesh_core::{LinkStatus, MeshTime};
    use glowmesh_wire::{Message, ResyncBeacon};
    use std::collections::VecDeque;

    /// Transport driven entirely by the test
    #[derive(Default)]
    struct ScriptedTransport {
        id: NodeId,
        members: Vec<NodeId>,
        clock: MeshTime,
        events: VecDeque<MeshEvent>,
        sent: Vec<Envelope>,
        link: LinkStatus,
        resets: u32,
        maintains: u32,
    }

    impl ScriptedTransport {
        fn new(id: u32) -> Self {
            ScriptedTransport {
                id: NodeId::new(id),
                ..Default::default()
            }
        }

        fn deliver(&mut self, from: u32, envelope: Envelope) {
            self.events.push_back(MeshEvent::Received {
                from: NodeId::new(from),
                payload: envelope.to_bytes(),
            });
        }
    }

    impl MeshTransport for ScriptedTransport {
        fn local_id(&self) -> NodeId {
            self.id
        }

        fn current_membership(&self) -> Vec<NodeId> {
            self.members.clone()
        }

        fn mesh_now(&self) -> MeshTime {
            self.clock
        }

        fn broadcast(&mut self, envelope: &Envelope) -> MeshResult<()> {
            self.sent.push(*envelope);
            Ok(())
        }

        fn poll_event(&mut self) -> Option<MeshEvent> {
            self.events.pop_front()
        }

        fn link_status(&self) -> LinkStatus {
            self.link
        }

        fn maintain(&mut self) {
            self.maintains += 1;
        }

        fn reset(&mut self) -> MeshResult<()> {
            self.resets += 1;
            self.link = LinkStatus::Up;
            Ok(())
        }
    }

    fn node(transport: ScriptedTransport) -> Node<ScriptedTransport, LastFrame> {
        Node::new(transport, LastFrame::default(), NodeConfig::default()).unwrap()
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_initial_election_uses_transport_view() {
        let mut t = ScriptedTransport::new(2);
        t.members = vec![NodeId::new(5), NodeId::new(9)];
        let n = node(t);
        assert!(n.is_controller());
        assert_eq!(n.current_display_mode(), DisplayMode::Connected);
    }

    #[test]
    fn test_upkeep_runs_once_per_tick() {
        let mut t = ScriptedTransport::new(5);
        for _ in 0..6 {
            t.deliver(2, Envelope::hello(NodeId::new(2), MeshTime::ZERO));
        }
        let mut n = node(t);
        n.tick_at(ms(10));
        n.tick_at(ms(20));
        assert_eq!(n.transport().maintains, 2);
        assert!(n.transport().events.is_empty());
    }

    #[test]
    fn test_tick_renders_frame() {
        let mut n = node(ScriptedTransport::new(7));
        n.tick_at(ms(30));
        let frame = n.renderer().frame.unwrap();
        assert_eq!(frame.phase, Phase::new(3));
        assert!(frame.accent);
        assert_eq!(frame.mode, DisplayMode::Alone);
        assert_eq!(n.stats().ticks, 1);
    }

    #[test]
    fn test_controller_broadcasts_through_transport() {
        let mut t = ScriptedTransport::new(2);
        t.members = vec![NodeId::new(5)];
        let mut n = node(t);

        n.tick_at(ms(2_560));
        let kinds: Vec<Message> = n.transport().sent.iter().map(|e| e.message).collect();
        assert_eq!(kinds, vec![Message::Beacon, Message::ModeUpdate(DisplayMode::Connected)]);
        assert_eq!(n.stats().broadcasts_out, 2);
    }

    #[test]
    fn test_follower_applies_controller_messages() {
        let mut t = ScriptedTransport::new(5);
        t.members = vec![NodeId::new(2)];
        t.clock = MeshTime::from_micros(1_050_000);
        t.deliver(2, Envelope::mode_update(NodeId::new(2), MeshTime::ZERO, DisplayMode::Connected));
        let mut n = node(t);
        assert!(!n.is_controller());

        // Phase 100 is outside the dead-band
        n.tick_at(ms(1_000));
        assert_eq!(n.current_display_mode(), DisplayMode::Connected);
        assert_eq!(n.current_phase(), Phase::new(100));

        let beacon = ResyncBeacon::new(NodeId::new(2), MeshTime::from_micros(1_000_000));
        n.transport_mut().deliver(2, beacon.into());
        n.tick_at(ms(1_005));
        assert_eq!(n.current_phase(), Phase::new(5));
    }

    #[test]
    fn test_sender_mismatch_dropped() {
        let mut t = ScriptedTransport::new(5);
        t.members = vec![NodeId::new(2)];
        // Datagram from 9 claiming to be the controller
        t.deliver(9, Envelope::mode_update(NodeId::new(2), MeshTime::ZERO, DisplayMode::Connected));
        t.events.push_back(MeshEvent::Received {
            from: NodeId::new(2),
            payload: Bytes::from_static(&[0xFF, 0, 0]),
        });
        let mut n = node(t);

        n.tick_at(ms(10));
        assert_eq!(n.current_display_mode(), DisplayMode::Alone);
        assert_eq!(n.stats().sender_mismatches, 1);
        assert_eq!(n.stats().malformed_dropped, 1);
    }

    #[test]
    fn test_link_fault_resets_transport() {
        let mut t = ScriptedTransport::new(5);
        t.members = vec![NodeId::new(2)];
        t.link = LinkStatus::Down;
        let mut n = node(t);

        for cycle in 1..=6u64 {
            n.transport_mut()
                .deliver(2, Envelope::hello(NodeId::new(2), MeshTime::ZERO));
            n.tick_at(ms(10_000 * cycle));
        }
        assert_eq!(n.transport().resets, 1);
        assert_eq!(n.stats().transport_resets, 1);
        assert_eq!(n.transport().link, LinkStatus::Up);
    }

    #[test]
    fn test_decode_from() {
        let env = Envelope::hello(NodeId::new(3), MeshTime::ZERO);
        let bytes = env.to_bytes();
        assert_eq!(decode_from(NodeId::new(3), &bytes).unwrap(), env);
        assert!(matches!(
            decode_from(NodeId::new(4), &bytes),
            Err(MeshError::SenderMismatch { .. })
        ));
    }
}
