//! Presence-based membership
//!
//! A peer is a member while it has been heard from within the peer
//! timeout. Each address is bound to the last valid identifier it
//! claimed. A node that comes back on the same address with a new
//! identifier replaces its old entry at once; orphan claims never
//! rebind and are attributed to the bound node.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use glowmesh_core::NodeId;

/// What a single sighting meant for membership
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sighting {
    /// First time this node is seen (or seen again after expiring)
    Joined(NodeId),
    Refreshed(NodeId),
    /// The address now claims a new identifier; `old` left the table
    Replaced { old: NodeId, new: NodeId },
}

impl Sighting {
    /// Node the datagram is attributed to
    pub fn node(&self) -> NodeId {
        match *self {
            Sighting::Joined(id) | Sighting::Refreshed(id) => id,
            Sighting::Replaced { new, .. } => new,
        }
    }
}

#[derive(Debug, Default)]
pub struct PresenceTable {
    /// Last time each peer was heard from
    peers: HashMap<NodeId, Instant>,
    by_addr: HashMap<SocketAddr, NodeId>,
}

impl PresenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a datagram from `addr` claiming to be `claimed`
    pub fn observe(&mut self, claimed: NodeId, addr: SocketAddr, now: Instant) -> Sighting {
        let id = match self.by_addr.get(&addr).copied() {
            Some(bound) if bound != claimed && claimed.is_valid() => {
                self.by_addr.insert(addr, claimed);
                if !self.by_addr.values().any(|other| *other == bound) {
                    self.peers.remove(&bound);
                }
                self.peers.insert(claimed, now);
                return Sighting::Replaced {
                    old: bound,
                    new: claimed,
                };
            }
            Some(bound) => bound,
            None => {
                self.by_addr.insert(addr, claimed);
                claimed
            }
        };

        match self.peers.get_mut(&id) {
            Some(last_seen) => {
                *last_seen = now;
                Sighting::Refreshed(id)
            }
            None => {
                self.peers.insert(id, now);
                Sighting::Joined(id)
            }
        }
    }

    /// Drop peers not heard from within `timeout`. Returns the expired ids.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> Vec<NodeId> {
        let expired: Vec<NodeId> = self
            .peers
            .iter()
            .filter(|(_, last_seen)| now.saturating_duration_since(**last_seen) > timeout)
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            self.peers.remove(id);
        }
        self.by_addr.retain(|_, bound| !expired.contains(bound));
        expired
    }

    pub fn members(&self) -> Vec<NodeId> {
        self.peers.keys().copied().collect()
    }

    pub fn clear(&mut self) {
        self.peers.clear();
        self.by_addr.clear();
    }
}
