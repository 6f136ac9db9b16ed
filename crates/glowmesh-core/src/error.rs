//! Error types for glowmesh

use thiserror::Error;

use crate::NodeId;

/// Core glowmesh errors
#[derive(Error, Debug)]
pub enum MeshError {
    // Wire errors
    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Unsupported wire version: {0}")]
    UnsupportedVersion(u8),

    #[error("Unknown message kind: {0}")]
    UnknownMessageKind(u8),

    #[error("Unknown display mode tag: {0}")]
    UnknownDisplayMode(u8),

    #[error("Sender mismatch: transport reported {transport}, envelope claims {envelope}")]
    SenderMismatch { transport: NodeId, envelope: NodeId },

    // Transport errors
    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Transport not bound")]
    TransportNotBound,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for glowmesh operations
pub type MeshResult<T> = Result<T, MeshError>;
