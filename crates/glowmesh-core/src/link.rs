//! Link-layer status as reported by the transport

/// Whether the transport believes it is attached to the mesh
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LinkStatus {
    #[default]
    Up,
    Down,
}

impl LinkStatus {
    #[inline]
    pub fn is_down(self) -> bool {
        matches!(self, LinkStatus::Down)
    }
}
