//! Mesh simulator for multi-node protocol testing
//!
//! Runs real [`Node`]s over [`SimTransport`]s in virtual time. Every
//! broadcast is fanned out over seeded per-pair chaos links; datagrams
//! delivered during a step are consumed on the next one.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use glowmesh_core::{DisplayMode, LinkStatus, MeshResult, MeshTime, NodeId, Phase};
use glowmesh_runtime::{LastFrame, Node, NodeConfig};
use glowmesh_transport::MeshTransport;

use crate::chaos::{ChaosConfig, ChaosNetwork, ChaosStats};
use crate::SimTransport;

pub type SimulatedNode = Node<SimTransport, LastFrame>;

/// Circular distance between two phases
pub fn phase_distance(a: Phase, b: Phase) -> u8 {
    let d = a.value().wrapping_sub(b.value());
    d.min(d.wrapping_neg())
}

struct Member {
    node: SimulatedNode,
    joined_at: Duration,
    /// Skew of this node's mesh clock against the shared one
    clock_offset_us: i64,
    online: bool,
}

pub struct MeshSimulator {
    members: BTreeMap<NodeId, Member>,
    links: BTreeMap<(NodeId, NodeId), ChaosNetwork>,
    chaos: ChaosConfig,
    node_config: NodeConfig,
    seed: u64,
    now: Duration,
    step: Duration,
    mesh_epoch: u32,
}

impl MeshSimulator {
    pub fn new(chaos: ChaosConfig, seed: u64) -> Self {
        MeshSimulator {
            members: BTreeMap::new(),
            links: BTreeMap::new(),
            chaos,
            node_config: NodeConfig::default(),
            seed,
            now: Duration::ZERO,
            step: Duration::from_millis(10),
            mesh_epoch: 0,
        }
    }

    pub fn perfect() -> Self {
        Self::new(ChaosConfig::perfect(), 0)
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.members.keys().copied().collect()
    }

    fn mesh_time(&self, offset_us: i64) -> MeshTime {
        let shared = self.mesh_epoch as i64 + self.now.as_micros() as i64 + offset_us;
        MeshTime::from_micros(shared as u32)
    }

    /// Boot a node at the current simulated time
    pub fn add_node(&mut self, id: u32) -> MeshResult<()> {
        let id = NodeId::new(id);
        let mut transport = SimTransport::new(id);
        transport.set_mesh_time(self.mesh_time(0));
        let node = Node::new(transport, LastFrame::default(), self.node_config.clone())?;
        self.members.insert(
            id,
            Member {
                node,
                joined_at: self.now,
                clock_offset_us: 0,
                online: true,
            },
        );
        Ok(())
    }

    pub fn node(&self, id: u32) -> Option<&SimulatedNode> {
        self.members.get(&NodeId::new(id)).map(|m| &m.node)
    }

    pub fn node_mut(&mut self, id: u32) -> Option<&mut SimulatedNode> {
        self.members.get_mut(&NodeId::new(id)).map(|m| &mut m.node)
    }

    /// Give every online node a view of every other online node; offline
    /// nodes see nobody. Only changed views are notified.
    pub fn connect_all(&mut self) {
        let online = self.online_ids();

        for (id, member) in &mut self.members {
            let view: Vec<NodeId> = if member.online {
                online.iter().copied().filter(|peer| peer != id).collect()
            } else {
                Vec::new()
            };
            let transport = member.node.transport_mut();
            if transport.current_membership() != view {
                transport.set_membership(view);
            }
        }
    }

    /// Override one node's membership snapshot
    pub fn set_membership(&mut self, id: u32, membership: Vec<NodeId>) {
        if let Some(member) = self.members.get_mut(&NodeId::new(id)) {
            member.node.transport_mut().set_membership(membership);
        }
    }

    /// Take a node off the air (or back on) and refresh every view
    pub fn set_online(&mut self, id: u32, online: bool) {
        if let Some(member) = self.members.get_mut(&NodeId::new(id)) {
            member.online = online;
        }
        self.connect_all();
    }

    pub fn set_clock_offset(&mut self, id: u32, offset_us: i64) {
        if let Some(member) = self.members.get_mut(&NodeId::new(id)) {
            member.clock_offset_us = offset_us;
        }
    }

    pub fn set_link_status(&mut self, id: u32, link: LinkStatus) {
        if let Some(member) = self.members.get_mut(&NodeId::new(id)) {
            member.node.transport_mut().set_link_status(link);
        }
    }

    /// Advance one step: tick every node, deliver arrivals, then send
    pub fn step(&mut self) {
        self.now += self.step;
        let now = self.now;

        let mut sent: Vec<(NodeId, Bytes)> = Vec::new();
        for (id, member) in &mut self.members {
            let shared = self.mesh_epoch as i64 + now.as_micros() as i64 + member.clock_offset_us;
            member
                .node
                .transport_mut()
                .set_mesh_time(MeshTime::from_micros(shared as u32));
            member.node.tick_at(now - member.joined_at);

            let outbox = member.node.transport_mut().take_outbox();
            if member.online {
                sent.extend(outbox.into_iter().map(|payload| (*id, payload)));
            }
        }

        // Deliver what arrived by now before anything new goes out
        for ((from, to), link) in &mut self.links {
            let delivered = link.advance_to(now);
            let Some(member) = self.members.get_mut(to) else {
                continue;
            };
            if !member.online {
                continue;
            }
            for payload in delivered {
                member.node.transport_mut().deliver(*from, payload);
            }
        }

        let online = self.online_ids();
        for (from, payload) in sent {
            for to in online.iter().copied().filter(|to| *to != from) {
                self.link(from, to).send(payload.clone());
            }
        }
    }

    fn link(&mut self, from: NodeId, to: NodeId) -> &mut ChaosNetwork {
        let seed = self
            .seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(((from.0 as u64) << 32) | to.0 as u64);
        let chaos = &self.chaos;
        let now = self.now;
        self.links.entry((from, to)).or_insert_with(|| {
            let mut link = ChaosNetwork::new(chaos.clone(), seed);
            link.advance_to(now);
            link
        })
    }

    pub fn run_for(&mut self, duration: Duration) {
        let end = self.now + duration;
        while self.now < end {
            self.step();
        }
    }

    fn online(&self) -> impl Iterator<Item = (&NodeId, &Member)> {
        self.members.iter().filter(|(_, m)| m.online)
    }

    pub fn online_ids(&self) -> Vec<NodeId> {
        self.online().map(|(id, _)| *id).collect()
    }

    /// Online nodes that currently believe they are controller
    pub fn controllers(&self) -> Vec<NodeId> {
        self.online()
            .filter(|(_, m)| m.node.is_controller())
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn phase(&self, id: u32) -> Option<Phase> {
        self.node(id).map(|n| n.current_phase())
    }

    pub fn display_mode(&self, id: u32) -> Option<DisplayMode> {
        self.node(id).map(|n| n.current_display_mode())
    }

    /// Largest circular phase distance between any two online nodes
    pub fn phase_spread(&self) -> u8 {
        let phases: Vec<Phase> = self.online().map(|(_, m)| m.node.current_phase()).collect();
        let mut spread = 0;
        for (i, a) in phases.iter().enumerate() {
            for b in &phases[i + 1..] {
                spread = spread.max(phase_distance(*a, *b));
            }
        }
        spread
    }

    /// Link statistics summed over every link
    pub fn link_totals(&self) -> ChaosStats {
        let mut total = ChaosStats::default();
        for link in self.links.values() {
            let s = link.stats();
            total.sent += s.sent;
            total.delivered += s.delivered;
            total.lost += s.lost;
            total.reordered += s.reordered;
            total.duplicated += s.duplicated;
            total.total_latency_us += s.total_latency_us;
            total.max_latency = total.max_latency.max(s.max_latency);
        }
        total
    }
}

/// Test scenario builder
pub struct ScenarioBuilder {
    nodes: Vec<u32>,
    chaos: ChaosConfig,
    seed: u64,
    step: Duration,
    mesh_epoch: u32,
    node_config: NodeConfig,
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        ScenarioBuilder {
            nodes: Vec::new(),
            chaos: ChaosConfig::perfect(),
            seed: 0,
            step: Duration::from_millis(10),
            mesh_epoch: 0,
            node_config: NodeConfig::default(),
        }
    }

    pub fn with_nodes(mut self, ids: &[u32]) -> Self {
        self.nodes = ids.to_vec();
        self
    }

    pub fn with_chaos(mut self, chaos: ChaosConfig) -> Self {
        self.chaos = chaos;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    /// Shared mesh clock reading at simulated time zero
    pub fn with_mesh_epoch(mut self, epoch: u32) -> Self {
        self.mesh_epoch = epoch;
        self
    }

    pub fn with_node_config(mut self, config: NodeConfig) -> Self {
        self.node_config = config;
        self
    }

    /// Boot every node and connect them all
    pub fn build(self) -> MeshResult<MeshSimulator> {
        let mut sim = MeshSimulator::new(self.chaos, self.seed);
        sim.step = self.step;
        sim.mesh_epoch = self.mesh_epoch;
        sim.node_config = self.node_config;
        for id in self.nodes {
            sim.add_node(id)?;
        }
        sim.connect_all();
        Ok(sim)
    }
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new()
    }
}
