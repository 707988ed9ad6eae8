//! Resolution of frames to services and payloads to values.
//!
//! [`ServiceRouter`] pairs the shared [`ServiceRegistry`] with the payload
//! [`Codec`]. Inbound frames are resolved by service id and their payloads
//! decoded with the schema of the side that sent them; outbound values are
//! encoded with the schema of the service they address.

use std::sync::Arc;

use bytes::Bytes;

use crate::{
    codec::{ApiReturn, Codec, CodecError},
    error::{CallError, ProtocolError},
    frame::{Frame, FrameHeader},
    service::{SchemaId, ServiceDescriptor, ServiceKind, ServiceRegistry},
};

/// A frame resolved to its service with the payload decoded.
#[derive(Debug)]
pub enum Inbound<H, V> {
    /// Request addressed to an api service.
    Api {
        /// Header of the request frame.
        header: H,
        /// Addressed service.
        service: ServiceDescriptor,
        /// Decoded request body.
        request: V,
    },
    /// Notification addressed to a msg service.
    Msg {
        /// Header of the notification frame.
        header: H,
        /// Addressed service.
        service: ServiceDescriptor,
        /// Decoded notification body.
        body: V,
    },
}

/// Maps service ids and names to descriptors and runs payloads through the
/// codec.
pub struct ServiceRouter<C> {
    registry: Arc<dyn ServiceRegistry>,
    codec: Arc<C>,
}

impl<C: Codec> ServiceRouter<C> {
    /// Create a router over shared collaborators.
    #[must_use]
    pub fn new(registry: Arc<dyn ServiceRegistry>, codec: Arc<C>) -> Self {
        Self { registry, codec }
    }

    /// The payload codec.
    #[must_use]
    pub fn codec(&self) -> &C { &self.codec }

    /// The service registry.
    #[must_use]
    pub fn registry(&self) -> &dyn ServiceRegistry { self.registry.as_ref() }

    /// Resolve a service by the id carried in a frame header.
    #[must_use]
    pub fn resolve(&self, service_id: u32) -> Option<&ServiceDescriptor> {
        self.registry.by_id(service_id)
    }

    /// Resolve an api service by name.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::UnknownService`] if no service has this name and
    /// [`CallError::NotAnApi`] if it names a notification.
    pub fn lookup_api(&self, name: &str) -> Result<&ServiceDescriptor, CallError> {
        let service = self
            .registry
            .by_name(name)
            .ok_or_else(|| CallError::UnknownService(name.to_owned()))?;
        if service.is_api() {
            Ok(service)
        } else {
            Err(CallError::NotAnApi(name.to_owned()))
        }
    }

    /// Resolve a notification service by name.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::UnknownService`] if no service has this name and
    /// [`CallError::NotAMsg`] if it names an api.
    pub fn lookup_msg(&self, name: &str) -> Result<&ServiceDescriptor, CallError> {
        let service = self
            .registry
            .by_name(name)
            .ok_or_else(|| CallError::UnknownService(name.to_owned()))?;
        if service.is_api() {
            Err(CallError::NotAMsg(name.to_owned()))
        } else {
            Ok(service)
        }
    }

    /// Encode `value` with `schema`.
    ///
    /// # Errors
    ///
    /// Propagates the codec's [`CodecError`].
    pub fn encode(&self, value: &C::Value, schema: &SchemaId) -> Result<Bytes, CodecError> {
        self.codec.encode(value, schema).map(Bytes::from)
    }

    /// Decode the body a peer sent to `service`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Decode`] if the codec rejects the payload.
    pub fn decode_inbound(
        &self,
        service: &ServiceDescriptor,
        payload: &[u8],
    ) -> Result<C::Value, ProtocolError> {
        self.codec
            .decode(payload, service.inbound_schema())
            .map_err(|source| ProtocolError::Decode {
                service: service.name().to_owned(),
                source,
            })
    }

    /// Encode a reply to a call on `service`.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if `service` is not an api or the codec
    /// rejects the reply.
    pub fn encode_return(
        &self,
        service: &ServiceDescriptor,
        ret: &ApiReturn<C::Value>,
    ) -> Result<Bytes, CodecError> {
        let schema = response_schema(service)?;
        self.codec.encode_return(ret, schema).map(Bytes::from)
    }

    /// Decode a reply received for a call on `service`.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if `service` is not an api or the codec
    /// rejects the reply.
    pub fn decode_reply(
        &self,
        service: &ServiceDescriptor,
        payload: &[u8],
    ) -> Result<ApiReturn<C::Value>, CodecError> {
        let schema = response_schema(service)?;
        self.codec.decode_return(payload, schema)
    }

    /// Resolve and decode a whole inbound frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownService`] if the header's service id
    /// does not resolve, or [`ProtocolError::Decode`] if the payload does not
    /// match the service's schema. Nothing is dispatched in either case.
    pub fn parse<H: FrameHeader>(
        &self,
        frame: Frame<H>,
    ) -> Result<Inbound<H, C::Value>, ProtocolError> {
        let (header, payload) = frame.into_parts();
        let service = self
            .resolve(header.service_id())
            .ok_or(ProtocolError::UnknownService(header.service_id()))?;
        let value = self.decode_inbound(service, &payload)?;
        let service = service.clone();
        Ok(match service.kind() {
            ServiceKind::Api { .. } => Inbound::Api {
                header,
                service,
                request: value,
            },
            ServiceKind::Msg { .. } => Inbound::Msg {
                header,
                service,
                body: value,
            },
        })
    }
}

fn response_schema(service: &ServiceDescriptor) -> Result<&SchemaId, CodecError> {
    service
        .response_schema()
        .ok_or_else(|| CodecError::new(format!("{} has no response schema", service.name())))
}
