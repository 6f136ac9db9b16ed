//! glowmesh Transport - The mesh collaborator the coordination core consumes
//!
//! This crate provides:
//! - `MeshTransport`: membership, identity, mesh clock, broadcast, events
//! - UDP broadcast transport with presence-based membership
//! - Wall-anchored mesh clock

pub mod clock;
pub mod presence;
pub mod udp;

pub use clock::*;
pub use presence::*;
pub use udp::*;

use bytes::Bytes;
use glowmesh_core::{LinkStatus, MeshResult, MeshTime, NodeId};
use glowmesh_wire::Envelope;
use rand::Rng;

/// Discrete event delivered by a transport, consumed on the next tick
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeshEvent {
    /// Membership changed; read `current_membership` for the new view
    MembershipChanged,
    /// Raw datagram attributed to `from` by the transport
    Received { from: NodeId, payload: Bytes },
    /// Mesh clock was re-anchored by `offset` microseconds
    ClockAdjusted(i32),
    PeerJoined(NodeId),
}

/// Transport collaborator.
///
/// Every call is non-blocking. Broadcast is best-effort: unordered, no
/// acknowledgment, silent loss allowed.
pub trait MeshTransport {
    fn local_id(&self) -> NodeId;

    /// Currently visible peers, excluding self. May contain `NodeId::ORPHAN`.
    fn current_membership(&self) -> Vec<NodeId>;

    fn mesh_now(&self) -> MeshTime;

    fn broadcast(&mut self, envelope: &Envelope) -> MeshResult<()>;

    /// Periodic upkeep, run once per tick before events are drained
    fn maintain(&mut self) {}

    /// Next pending event, if any
    fn poll_event(&mut self) -> Option<MeshEvent>;

    fn link_status(&self) -> LinkStatus;

    /// Tear down and reinitialize the link
    fn reset(&mut self) -> MeshResult<()>;
}

/// Random valid node identifier
pub fn random_node_id() -> NodeId {
    NodeId::new(rand::thread_rng().gen_range(1..=u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_node_id_is_valid() {
        for _ in 0..100 {
            assert!(random_node_id().is_valid());
        }
    }
}
