//! Controller election: the smallest valid identifier in view wins

use glowmesh_core::{DisplayMode, NodeId, Role};
use tracing::{debug, info, warn};

use crate::{MembershipView, NodeState};

/// Result of one election round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Election {
    pub controller: NodeId,
    pub role: Role,
}

/// Elect a controller from the local identity and a membership view.
///
/// Candidates are the valid peers plus the local node; the minimum
/// wins. Identifiers are unique so there is never a tie.
pub fn elect(local_id: NodeId, membership: &MembershipView) -> Election {
    let controller = membership
        .lowest()
        .map_or(local_id, |lowest| lowest.min(local_id));

    let role = if controller == local_id {
        Role::Controller
    } else {
        Role::Follower
    };

    Election { controller, role }
}

/// What an election round changed on the node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElectionReport {
    pub election: Election,
    pub previous_controller: NodeId,
    pub previous_mode: DisplayMode,
    pub mode: DisplayMode,
}

impl ElectionReport {
    pub fn controller_changed(&self) -> bool {
        self.previous_controller != self.election.controller
    }

    pub fn mode_changed(&self) -> bool {
        self.previous_mode != self.mode
    }
}

/// Runs election rounds against the node state
#[derive(Clone, Copy, Debug, Default)]
pub struct ElectionEngine;

impl ElectionEngine {
    pub fn new() -> Self {
        ElectionEngine
    }

    /// Replace the membership view, elect, and apply the mode side effects:
    /// empty membership forces Alone, a controller with peers goes Connected.
    pub fn run(&self, state: &mut NodeState, membership: MembershipView) -> ElectionReport {
        if membership.only_orphans() {
            warn!(
                orphans = membership.orphans(),
                "membership holds only orphan entries, electing self"
            );
        }

        let election = elect(state.local_id(), &membership);
        let previous_controller = state.known_controller();
        let previous_mode = state.display_mode();

        let mode = if membership.is_empty() {
            DisplayMode::Alone
        } else if election.role.is_controller() {
            DisplayMode::Connected
        } else {
            previous_mode
        };

        debug!(
            peers = ?membership.peers(),
            controller = %election.controller,
            "election round"
        );

        state.set_membership(membership);
        state.set_election(election);
        state.set_display_mode(mode);

        let report = ElectionReport {
            election,
            previous_controller,
            previous_mode,
            mode,
        };

        if report.controller_changed() {
            if election.role.is_controller() {
                info!(node = %state.local_id(), "this node is the controller now");
            } else {
                info!(controller = %election.controller, "controller changed");
            }
        }
        if report.mode_changed() {
            info!(from = previous_mode.name(), to = mode.name(), "display mode changed by election");
        }

        report
    }
}
