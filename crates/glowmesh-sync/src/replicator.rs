//! Display-mode replication from controller to followers

use glowmesh_core::{DisplayMode, MeshTime, NodeId};
use glowmesh_wire::Envelope;
use tracing::{debug, info};

use crate::NodeState;

/// Result of handling an inbound mode update
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeOutcome {
    Applied { from: DisplayMode, to: DisplayMode },
    Unchanged,
    UnknownSender { sender: NodeId, controller: NodeId },
    Loopback,
}

/// Stateless; all mode state lives in [`NodeState`]
#[derive(Clone, Copy, Debug, Default)]
pub struct Replicator;

impl Replicator {
    pub fn new() -> Self {
        Replicator
    }

    /// Mode update to broadcast on the mode timer, controller only
    pub fn announce(&self, state: &NodeState, now: MeshTime) -> Option<Envelope> {
        if !state.is_controller() || state.membership().is_empty() {
            return None;
        }
        Some(Envelope::mode_update(state.local_id(), now, state.display_mode()))
    }

    /// Adopt the controller's mode. Mode updates are idempotent so age is
    /// not checked.
    pub fn on_mode_update(&self, state: &mut NodeState, sender: NodeId, mode: DisplayMode) -> ModeOutcome {
        if sender == state.local_id() {
            return ModeOutcome::Loopback;
        }
        let controller = state.known_controller();
        if sender != controller {
            debug!(%sender, %controller, "mode update from non-controller dropped");
            return ModeOutcome::UnknownSender { sender, controller };
        }

        let from = state.display_mode();
        if from == mode {
            return ModeOutcome::Unchanged;
        }
        state.set_display_mode(mode);
        info!(from = from.name(), to = mode.name(), "display mode replicated from controller");
        ModeOutcome::Applied { from, to: mode }
    }
}
