//! In-memory transport driven by the mesh simulator

use std::collections::VecDeque;

use bytes::Bytes;
use glowmesh_core::{LinkStatus, MeshError, MeshResult, MeshTime, NodeId};
use glowmesh_transport::{MeshEvent, MeshTransport};
use glowmesh_wire::Envelope;

/// A transport whose membership, clock and inbox are set from outside
#[derive(Debug)]
pub struct SimTransport {
    local_id: NodeId,
    membership: Vec<NodeId>,
    mesh_now: MeshTime,
    inbox: VecDeque<MeshEvent>,
    outbox: Vec<Bytes>,
    link: LinkStatus,
    /// When set, every broadcast fails
    send_failure: bool,
    resets: u32,
}

impl SimTransport {
    pub fn new(local_id: NodeId) -> Self {
        SimTransport {
            local_id,
            membership: Vec::new(),
            mesh_now: MeshTime::ZERO,
            inbox: VecDeque::new(),
            outbox: Vec::new(),
            link: LinkStatus::Up,
            send_failure: false,
            resets: 0,
        }
    }

    /// Replace the membership and queue a change notification
    pub fn set_membership(&mut self, membership: Vec<NodeId>) {
        self.membership = membership;
        self.inbox.push_back(MeshEvent::MembershipChanged);
    }

    pub fn set_mesh_time(&mut self, now: MeshTime) {
        self.mesh_now = now;
    }

    pub fn set_link_status(&mut self, link: LinkStatus) {
        self.link = link;
    }

    pub fn set_send_failure(&mut self, failing: bool) {
        self.send_failure = failing;
    }

    pub fn push_event(&mut self, event: MeshEvent) {
        self.inbox.push_back(event);
    }

    pub fn deliver(&mut self, from: NodeId, payload: Bytes) {
        self.inbox.push_back(MeshEvent::Received { from, payload });
    }

    /// Take everything broadcast since the last call
    pub fn take_outbox(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.outbox)
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }
}

impl MeshTransport for SimTransport {
    fn local_id(&self) -> NodeId {
        self.local_id
    }

    fn current_membership(&self) -> Vec<NodeId> {
        self.membership.clone()
    }

    fn mesh_now(&self) -> MeshTime {
        self.mesh_now
    }

    fn broadcast(&mut self, envelope: &Envelope) -> MeshResult<()> {
        if self.send_failure {
            return Err(MeshError::TransportError("simulated send failure".into()));
        }
        self.outbox.push(envelope.to_bytes());
        Ok(())
    }

    fn poll_event(&mut self) -> Option<MeshEvent> {
        self.inbox.pop_front()
    }

    fn link_status(&self) -> LinkStatus {
        self.link
    }

    fn reset(&mut self) -> MeshResult<()> {
        self.resets += 1;
        self.link = LinkStatus::Up;
        self.send_failure = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_change_is_notified() {
        let mut t = SimTransport::new(NodeId::new(1));
        t.set_membership(vec![NodeId::new(2)]);
        assert_eq!(t.poll_event(), Some(MeshEvent::MembershipChanged));
        assert_eq!(t.current_membership(), vec![NodeId::new(2)]);
        assert_eq!(t.poll_event(), None);
    }

    #[test]
    fn test_broadcast_and_failure() {
        let mut t = SimTransport::new(NodeId::new(1));
        let env = Envelope::hello(NodeId::new(1), MeshTime::ZERO);
        t.broadcast(&env).unwrap();
        assert_eq!(t.take_outbox().len(), 1);

        t.set_send_failure(true);
        assert!(t.broadcast(&env).is_err());
        t.reset().unwrap();
        assert!(t.broadcast(&env).is_ok());
        assert_eq!(t.resets(), 1);
    }
}
