//! Eight-byte header used by plain clients.

use bytes::{BufMut, BytesMut};

use super::{FrameHeader, MessageKind, read_u32};

/// `serviceId:u32, sequenceId:u32`, big-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SimpleHeader {
    service_id: u32,
    sequence_id: u32,
}

impl SimpleHeader {
    /// Create a header addressing `service_id` with correlation `sequence_id`.
    #[must_use]
    pub const fn new(service_id: u32, sequence_id: u32) -> Self {
        Self {
            service_id,
            sequence_id,
        }
    }
}

impl FrameHeader for SimpleHeader {
    const LEN: usize = 8;

    fn service_id(&self) -> u32 { self.service_id }

    fn sequence_id(&self) -> u32 { self.sequence_id }

    fn reply(&self, _kind: MessageKind) -> Self { *self }

    fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(Self::LEN);
        dst.put_u32(self.service_id);
        dst.put_u32(self.sequence_id);
    }

    fn read_from(src: &[u8]) -> Self {
        Self {
            service_id: read_u32(src, 0),
            sequence_id: read_u32(src, 4),
        }
    }
}
