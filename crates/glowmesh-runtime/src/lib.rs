//! glowmesh Runtime - Node orchestration and the cooperative tick loop
//!
//! Each tick runs four stages:
//! 1. Drain transport events (bounded) into the coordinator
//! 2. Advance the phase clock, election and mode timers
//! 3. Carry out broadcasts and transport resets
//! 4. Hand the frame to the renderer

pub mod node;
pub mod render;

pub use node::*;
pub use render::*;
