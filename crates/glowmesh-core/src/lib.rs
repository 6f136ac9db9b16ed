//! glowmesh Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every layer of the mesh:
//! - Node identities and the orphan sentinel
//! - Mesh time (wrapping microsecond clock) and message age
//! - Display mode, role, link status and the 8-bit animation phase
//! - Build-time protocol constants

pub mod config;
pub mod error;
pub mod id;
pub mod link;
pub mod mode;
pub mod time;

pub use config::*;
pub use error::*;
pub use id::*;
pub use link::*;
pub use mode::*;
pub use time::*;
