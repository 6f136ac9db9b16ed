//! Display mode and role definitions
//!
//! - Alone: no peers visible, the node runs its solitary animation
//! - Connected: the node is part of a mesh and follows the shared phase

/// What the renderer should be showing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DisplayMode {
    /// Searching for peers
    #[default]
    Alone = 0x01,

    /// Part of a mesh, animating in lock-step
    Connected = 0x02,
}

impl DisplayMode {
    /// Parse from wire byte
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(DisplayMode::Alone),
            0x02 => Some(DisplayMode::Connected),
            _ => None,
        }
    }

    /// Convert to wire byte
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            DisplayMode::Alone => "alone",
            DisplayMode::Connected => "connected",
        }
    }
}

/// Role of a node in the current election round
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Originates beacons and mode updates
    Controller,
    /// Consumes beacons and mode updates
    Follower,
}

impl Role {
    #[inline]
    pub fn is_controller(self) -> bool {
        matches!(self, Role::Controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_mode_bytes() {
        assert_eq!(DisplayMode::Alone.to_byte(), 1);
        assert_eq!(DisplayMode::Connected.to_byte(), 2);
        assert_eq!(DisplayMode::from_byte(1), Some(DisplayMode::Alone));
        assert_eq!(DisplayMode::from_byte(2), Some(DisplayMode::Connected));
        assert_eq!(DisplayMode::from_byte(0), None);
        assert_eq!(DisplayMode::from_byte(3), None);
    }

    #[test]
    fn test_default_mode_is_alone() {
        assert_eq!(DisplayMode::default(), DisplayMode::Alone);
    }
}
