//! Node protocol state, owned by a single tick loop

use glowmesh_core::{DisplayMode, NodeId, Phase, Role};

use crate::{AnomalyCounters, Election, MembershipView};

/// Everything the coordination core mutates on a node.
///
/// Only the election writes the role and known controller; only the
/// phase clock and synchronizer write the phase.
#[derive(Clone, Debug)]
pub struct NodeState {
    local_id: NodeId,
    membership: MembershipView,
    role: Role,
    known_controller: NodeId,
    display_mode: DisplayMode,
    phase: Phase,
    anomalies: AnomalyCounters,
}

impl NodeState {
    /// A freshly booted node sees no peers and so controls itself
    pub fn new(local_id: NodeId) -> Self {
        NodeState {
            local_id,
            membership: MembershipView::new(),
            role: Role::Controller,
            known_controller: local_id,
            display_mode: DisplayMode::Alone,
            phase: Phase::ZERO,
            anomalies: AnomalyCounters::default(),
        }
    }

    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    pub fn membership(&self) -> &MembershipView {
        &self.membership
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn known_controller(&self) -> NodeId {
        self.known_controller
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn anomalies(&self) -> &AnomalyCounters {
        &self.anomalies
    }

    pub fn is_controller(&self) -> bool {
        self.role.is_controller()
    }

    pub(crate) fn anomalies_mut(&mut self) -> &mut AnomalyCounters {
        &mut self.anomalies
    }

    pub(crate) fn set_membership(&mut self, membership: MembershipView) {
        self.membership = membership;
    }

    pub(crate) fn set_election(&mut self, election: Election) {
        self.role = election.role;
        self.known_controller = election.controller;
    }

    pub(crate) fn set_display_mode(&mut self, mode: DisplayMode) {
        self.display_mode = mode;
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }
}
