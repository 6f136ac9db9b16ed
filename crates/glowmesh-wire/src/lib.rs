//! glowmesh Wire Protocol - Broadcast envelope format
//!
//! Every broadcast shares one envelope:
//! - Byte 0: version (4 bits) + message kind (4 bits)
//! - Bytes 1-4: sender node ID (LE)
//! - Bytes 5-8: mesh timestamp in microseconds (LE)
//! - Kind-specific payload (a single mode tag for mode updates)

pub mod envelope;
pub mod kind;

pub use envelope::*;
pub use kind::*;
