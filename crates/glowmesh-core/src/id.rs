//! Identity types for glowmesh
//!
//! Node identities are assigned by the transport at join time and are
//! unique across the mesh. They are 32-bit to match the identifiers the
//! mesh layer hands out.

use std::fmt;

/// Node identity - opaque, unique per node, immutable for its lifetime
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Orphan sentinel. The transport occasionally reports it in a
    /// membership list; it never names a real node.
    pub const ORPHAN: NodeId = NodeId(0);

    #[inline]
    pub fn new(id: u32) -> Self {
        NodeId(id)
    }

    /// True for every identifier except the orphan sentinel
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::ORPHAN
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        NodeId(u32::from_le_bytes(bytes))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        NodeId(id)
    }
}
