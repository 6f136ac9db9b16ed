//! Message kind tags
//!
//! A small closed set carried in the low nibble of the first envelope
//! byte. New kinds require a wire version bump.

/// Message kind carried by an envelope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageKind {
    /// Controller phase-wrap marker used for resync
    Beacon = 0x01,
    /// Controller display-mode announcement
    ModeUpdate = 0x02,
    /// Transport-level presence ping, never applied by the core
    Hello = 0x03,
}

impl MessageKind {
    pub fn from_nibble(n: u8) -> Option<Self> {
        match n {
            0x01 => Some(MessageKind::Beacon),
            0x02 => Some(MessageKind::ModeUpdate),
            0x03 => Some(MessageKind::Hello),
            _ => None,
        }
    }

    #[inline]
    pub fn to_nibble(self) -> u8 {
        self as u8
    }

    /// Payload bytes following the fixed header
    #[inline]
    pub fn payload_len(self) -> usize {
        match self {
            MessageKind::Beacon | MessageKind::Hello => 0,
            MessageKind::ModeUpdate => 1,
        }
    }
}
