//! Payload codec interface.
//!
//! Payload encoding is supplied by the application. A [`Codec`] turns a
//! value into bytes and back given the [`SchemaId`] a service declares for
//! its request, response or notification body. The transport core never
//! inspects payloads itself.
//!
//! Api replies carry either a response or an [`RpcError`]. The default
//! [`Codec::encode_return`] and [`Codec::decode_return`] wrap both cases in a
//! small `bincode` envelope; codecs with a native error representation
//! override them.

use crate::{error::RpcError, service::SchemaId};

mod envelope;

/// Error reported by a [`Codec`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CodecError {
    message: String,
}

impl CodecError {
    /// Create an error with a description of what failed.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Description of the failure.
    #[must_use]
    pub fn message(&self) -> &str { &self.message }
}

/// Terminal value of an api call: a response or an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiReturn<V> {
    /// The handler produced a response.
    Success(V),
    /// The handler failed.
    Failure(RpcError),
}

impl<V> ApiReturn<V> {
    /// Returns `true` for [`ApiReturn::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool { matches!(self, Self::Success(_)) }

    /// Convert into a standard [`Result`].
    ///
    /// # Errors
    ///
    /// Returns the carried [`RpcError`] for [`ApiReturn::Failure`].
    pub fn into_result(self) -> Result<V, RpcError> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(error) => Err(error),
        }
    }
}

/// Schema-driven payload encoder and decoder.
///
/// Implementations must be safe to share between connections; the core only
/// ever calls them through `&self`.
pub trait Codec: Send + Sync + 'static {
    /// Decoded payload representation handed to handlers.
    type Value: Send + Sync + 'static;

    /// Encode `value` according to `schema`.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if `value` does not satisfy `schema`.
    fn encode(&self, value: &Self::Value, schema: &SchemaId) -> Result<Vec<u8>, CodecError>;

    /// Decode `bytes` according to `schema`.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if `bytes` is not a valid `schema` payload.
    fn decode(&self, bytes: &[u8], schema: &SchemaId) -> Result<Self::Value, CodecError>;

    /// Encode an api reply; `schema` is the service's response schema.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the response cannot be encoded.
    fn encode_return(
        &self,
        ret: &ApiReturn<Self::Value>,
        schema: &SchemaId,
    ) -> Result<Vec<u8>, CodecError> {
        envelope::encode_return(self, ret, schema)
    }

    /// Decode an api reply produced by [`Codec::encode_return`].
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if `bytes` is not a valid reply.
    fn decode_return(
        &self,
        bytes: &[u8],
        schema: &SchemaId,
    ) -> Result<ApiReturn<Self::Value>, CodecError> {
        envelope::decode_return(self, bytes, schema)
    }
}
