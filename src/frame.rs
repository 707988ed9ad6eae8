//! Binary frame layout shared by every connection.
//!
//! A frame is a fixed-width big-endian header followed immediately by an
//! opaque payload. No length prefix is carried: the transport delivers whole
//! messages, so the payload is simply whatever follows the header.
//!
//! Two header shapes exist:
//!
//! * [`SimpleHeader`] (8 bytes) for a plain client talking to one upstream
//!   peer.
//! * [`MultiplexedHeader`] (20 bytes) for links that carry many downstream
//!   identities, tagged with a [`ConnectionTag`] and a [`MessageKind`].

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

mod multiplexed;
mod simple;

pub use multiplexed::{ConnectionTag, MessageKind, MultiplexedHeader};
pub use simple::SimpleHeader;

/// Fixed-width header preceding every payload.
pub trait FrameHeader: Clone + fmt::Debug + Send + Sync + 'static {
    /// Encoded header length in bytes.
    const LEN: usize;

    /// Identifier of the service the frame addresses.
    fn service_id(&self) -> u32;

    /// Correlation identifier of the call the frame belongs to.
    fn sequence_id(&self) -> u32;

    /// Build the header for a reply to this frame.
    ///
    /// Headers without a kind field ignore `kind`.
    #[must_use]
    fn reply(&self, kind: MessageKind) -> Self;

    /// Append the encoded header to `dst`.
    fn write_to(&self, dst: &mut BytesMut);

    /// Read a header from the first [`Self::LEN`] bytes of `src`.
    ///
    /// Callers guarantee `src.len() >= Self::LEN`.
    fn read_from(src: &[u8]) -> Self;
}

/// One unit of wire traffic: a header plus its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame<H> {
    header: H,
    payload: Bytes,
}

impl<H: FrameHeader> Frame<H> {
    /// Pair `header` with an already-encoded payload.
    #[must_use]
    pub fn new(header: H, payload: impl Into<Bytes>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    /// The parsed header.
    #[must_use]
    pub fn header(&self) -> &H { &self.header }

    /// The payload bytes following the header.
    #[must_use]
    pub fn payload(&self) -> &Bytes { &self.payload }

    /// Split the frame into header and payload.
    #[must_use]
    pub fn into_parts(self) -> (H, Bytes) { (self.header, self.payload) }

    /// Total encoded length: header plus payload.
    #[must_use]
    pub fn encoded_len(&self) -> usize { H::LEN + self.payload.len() }

    /// Concatenate header and payload into a single buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use callwire::frame::{Frame, SimpleHeader};
    ///
    /// let frame = Frame::new(SimpleHeader::new(7, 1), vec![0xAA]);
    /// assert_eq!(&frame.encode()[..], &[0, 0, 0, 7, 0, 0, 0, 1, 0xAA]);
    /// ```
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.header.write_to(&mut buf);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parse a whole message received from the transport.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] if `bytes` is shorter than the
    /// header.
    pub fn decode(bytes: Bytes) -> Result<Self, ProtocolError> {
        if bytes.len() < H::LEN {
            return Err(ProtocolError::Truncated {
                expected: H::LEN,
                actual: bytes.len(),
            });
        }
        let header = H::read_from(&bytes[..H::LEN]);
        Ok(Self {
            header,
            payload: bytes.slice(H::LEN..),
        })
    }
}

/// Read the big-endian `u32` starting at `offset`.
pub(crate) fn read_u32(src: &[u8], offset: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&src[offset..offset + 4]);
    u32::from_be_bytes(word)
}
