//! One-way notification handed to msg handlers.

use std::fmt;

use crate::{codec::Codec, frame::FrameHeader, service::ServiceDescriptor};

/// An inbound notification. There is nothing to answer.
pub struct MsgCall<C: Codec, H: FrameHeader> {
    header: H,
    service: ServiceDescriptor,
    body: C::Value,
}

impl<C: Codec, H: FrameHeader> MsgCall<C, H> {
    pub(crate) fn new(header: H, service: ServiceDescriptor, body: C::Value) -> Self {
        Self {
            header,
            service,
            body,
        }
    }

    /// Header of the notification frame.
    #[must_use]
    pub fn header(&self) -> &H { &self.header }

    /// The addressed service.
    #[must_use]
    pub fn service(&self) -> &ServiceDescriptor { &self.service }

    /// The decoded body.
    #[must_use]
    pub fn body(&self) -> &C::Value { &self.body }

    /// Take ownership of the decoded body.
    #[must_use]
    pub fn into_body(self) -> C::Value { self.body }
}

impl<C: Codec, H: FrameHeader> fmt::Debug for MsgCall<C, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MsgCall")
            .field("header", &self.header)
            .field("service", &self.service.name())
            .finish_non_exhaustive()
    }
}
