//! Broadcast envelope shared by beacons, mode updates and presence pings

use bytes::{Buf, BufMut, Bytes, BytesMut};

use glowmesh_core::{DisplayMode, MeshError, MeshResult, MeshTime, NodeId};

use crate::MessageKind;

/// Fixed header size in bytes
pub const ENVELOPE_HEADER_SIZE: usize = 9;

/// Largest encoded envelope
pub const MAX_ENVELOPE_SIZE: usize = ENVELOPE_HEADER_SIZE + 1;

/// Current wire protocol version
pub const WIRE_VERSION: u8 = 1;

/// Kind-specific envelope body
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Message {
    Beacon,
    ModeUpdate(DisplayMode),
    Hello,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Beacon => MessageKind::Beacon,
            Message::ModeUpdate(_) => MessageKind::ModeUpdate,
            Message::Hello => MessageKind::Hello,
        }
    }
}

/// Decoded broadcast envelope
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Node that built the envelope
    pub sender: NodeId,
    /// Mesh time at send
    pub timestamp: MeshTime,
    pub message: Message,
}

/// Controller phase-wrap marker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResyncBeacon {
    pub sender: NodeId,
    pub sent_at: MeshTime,
}

impl ResyncBeacon {
    pub fn new(sender: NodeId, sent_at: MeshTime) -> Self {
        ResyncBeacon { sender, sent_at }
    }
}

impl From<ResyncBeacon> for Envelope {
    fn from(beacon: ResyncBeacon) -> Self {
        Envelope::new(beacon.sender, beacon.sent_at, Message::Beacon)
    }
}

impl Envelope {
    pub fn new(sender: NodeId, timestamp: MeshTime, message: Message) -> Self {
        Envelope {
            sender,
            timestamp,
            message,
        }
    }

    pub fn mode_update(sender: NodeId, timestamp: MeshTime, mode: DisplayMode) -> Self {
        Envelope::new(sender, timestamp, Message::ModeUpdate(mode))
    }

    pub fn hello(sender: NodeId, timestamp: MeshTime) -> Self {
        Envelope::new(sender, timestamp, Message::Hello)
    }

    #[inline]
    pub fn kind(&self) -> MessageKind {
        self.message.kind()
    }

    /// View as a resync beacon, if it is one
    pub fn as_beacon(&self) -> Option<ResyncBeacon> {
        match self.message {
            Message::Beacon => Some(ResyncBeacon::new(self.sender, self.timestamp)),
            _ => None,
        }
    }

    /// Encoded size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        ENVELOPE_HEADER_SIZE + self.kind().payload_len()
    }

    /// Encode into a caller-supplied buffer
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(self.size());
        buf.put_u8((WIRE_VERSION << 4) | self.kind().to_nibble());
        buf.put_slice(&self.sender.to_bytes());
        buf.put_slice(&self.timestamp.to_bytes());
        if let Message::ModeUpdate(mode) = self.message {
            buf.put_u8(mode.to_byte());
        }
    }

    /// Encode to a new buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode an envelope. The buffer must hold exactly one envelope.
    pub fn decode(mut buf: &[u8]) -> MeshResult<Self> {
        if buf.len() < ENVELOPE_HEADER_SIZE {
            return Err(MeshError::BufferTooShort {
                expected: ENVELOPE_HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let first = buf.get_u8();
        let version = first >> 4;
        if version != WIRE_VERSION {
            return Err(MeshError::UnsupportedVersion(version));
        }
        let kind = MessageKind::from_nibble(first & 0x0F)
            .ok_or(MeshError::UnknownMessageKind(first & 0x0F))?;

        let mut raw = [0u8; 4];
        buf.copy_to_slice(&mut raw);
        let sender = NodeId::from_bytes(raw);
        buf.copy_to_slice(&mut raw);
        let timestamp = MeshTime::from_bytes(raw);

        let expected = kind.payload_len();
        if buf.remaining() != expected {
            return Err(MeshError::InvalidWireFormat(format!(
                "{:?} payload: expected {} bytes, got {}",
                kind,
                expected,
                buf.remaining()
            )));
        }

        let message = match kind {
            MessageKind::Beacon => Message::Beacon,
            MessageKind::Hello => Message::Hello,
            MessageKind::ModeUpdate => {
                let tag = buf.get_u8();
                let mode = DisplayMode::from_byte(tag).ok_or(MeshError::UnknownDisplayMode(tag))?;
                Message::ModeUpdate(mode)
            }
        };

        Ok(Envelope {
            sender,
            timestamp,
            message,
        })
    }
}

/// Sender claimed by an encoded envelope, read without validating the rest.
///
/// Transports use this to attribute presence before the full decode.
pub fn peek_sender(buf: &[u8]) -> Option<NodeId> {
    let raw: [u8; 4] = buf.get(1..5)?.try_into().ok()?;
    Some(NodeId::from_bytes(raw))
}
