//! glowmesh Test Harness - Mesh simulation and protocol validation
//!
//! This crate provides:
//! - Seeded chaos links (latency, jitter, loss, reordering, duplication)
//! - An in-memory transport with a settable mesh clock
//! - A multi-node mesh simulator driving real `Node`s
//! - End-to-end scenarios over the simulator

pub mod chaos;
pub mod integration;
pub mod sim_transport;
pub mod simulator;

pub use chaos::*;
pub use integration::*;
pub use sim_transport::*;
pub use simulator::*;
