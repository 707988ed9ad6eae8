//! Twenty-byte header used on links that multiplex downstream peers.
//!
//! Layout (big-endian):
//!
//! | offset | field |
//! |---|---|
//! | 0 | connection tag |
//! | 4 | reserved, always written as 0 |
//! | 8 | message kind |
//! | 12 | service id |
//! | 16 | sequence id |
//!
//! The same layout is used in both directions.

use std::fmt;

use bytes::{BufMut, BytesMut};

use super::{FrameHeader, read_u32};

/// Identifier of the downstream peer a multiplexed frame belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionTag(u32);

impl ConnectionTag {
    /// Wrap a raw tag value.
    #[must_use]
    pub const fn new(tag: u32) -> Self { Self(tag) }

    /// Return the raw tag value.
    #[must_use]
    pub const fn as_u32(self) -> u32 { self.0 }
}

impl From<u32> for ConnectionTag {
    fn from(value: u32) -> Self { Self(value) }
}

impl fmt::Display for ConnectionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "fd#{}", self.0) }
}

/// Discriminator telling the multiplexing peer what a frame is for.
///
/// The numbering is owned by the peer; this crate only carries the value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MessageKind(u32);

impl MessageKind {
    /// Wrap a raw kind value.
    #[must_use]
    pub const fn new(kind: u32) -> Self { Self(kind) }

    /// Return the raw kind value.
    #[must_use]
    pub const fn as_u32(self) -> u32 { self.0 }
}

impl From<u32> for MessageKind {
    fn from(value: u32) -> Self { Self(value) }
}

/// `connectionTag, reserved, messageKind, serviceId, sequenceId`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MultiplexedHeader {
    tag: ConnectionTag,
    kind: MessageKind,
    service_id: u32,
    sequence_id: u32,
}

impl MultiplexedHeader {
    /// Create a header for the downstream peer `tag`.
    #[must_use]
    pub const fn new(
        tag: ConnectionTag,
        kind: MessageKind,
        service_id: u32,
        sequence_id: u32,
    ) -> Self {
        Self {
            tag,
            kind,
            service_id,
            sequence_id,
        }
    }

    /// Downstream peer this frame belongs to.
    #[must_use]
    pub const fn tag(&self) -> ConnectionTag { self.tag }

    /// Message kind discriminator.
    #[must_use]
    pub const fn kind(&self) -> MessageKind { self.kind }
}

impl FrameHeader for MultiplexedHeader {
    const LEN: usize = 20;

    fn service_id(&self) -> u32 { self.service_id }

    fn sequence_id(&self) -> u32 { self.sequence_id }

    fn reply(&self, kind: MessageKind) -> Self { Self { kind, ..*self } }

    fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(Self::LEN);
        dst.put_u32(self.tag.as_u32());
        dst.put_u32(0);
        dst.put_u32(self.kind.as_u32());
        dst.put_u32(self.service_id);
        dst.put_u32(self.sequence_id);
    }

    fn read_from(src: &[u8]) -> Self {
        let reserved = read_u32(src, 4);
        if reserved != 0 {
            log::debug!("multiplexed header carries non-zero reserved word: {reserved:#010x}");
        }
        Self {
            tag: ConnectionTag(read_u32(src, 0)),
            kind: MessageKind(read_u32(src, 8)),
            service_id: read_u32(src, 12),
            sequence_id: read_u32(src, 16),
        }
    }
}
