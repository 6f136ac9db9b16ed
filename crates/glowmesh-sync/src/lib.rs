//! glowmesh Sync - The coordination core
//!
//! This crate implements everything that keeps a mesh of independent
//! nodes animating in lock-step:
//! - Membership view (orphan filtering, sorted snapshot)
//! - Election: minimum identifier wins
//! - Phase clock and deadline scheduling
//! - Synchronizer: beacon emission, staleness and dead-band checks, correction
//! - Replicator: display-mode propagation
//! - Anomaly monitor: clock inversions, orphans, link faults
//! - Coordinator: pure (state, event) -> actions driver over all of the above

pub mod anomaly;
pub mod coordinator;
pub mod election;
pub mod membership;
pub mod phase;
pub mod replicator;
pub mod schedule;
pub mod state;
pub mod synchronizer;

pub use anomaly::*;
pub use coordinator::*;
pub use election::*;
pub use membership::*;
pub use phase::*;
pub use replicator::*;
pub use schedule::*;
pub use state::*;
pub use synchronizer::*;
