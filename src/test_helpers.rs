#![cfg(any(test, feature = "test-helpers"))]
//! Test-only collaborators: a schema-checking codec, a sample registry and
//! a scriptable in-memory transport.

use bincode::{config, decode_from_slice, encode_to_vec};

use crate::{
    codec::{Codec, CodecError},
    service::{SchemaId, ServiceDescriptor, ServiceMap},
};

mod mock_transport;

pub use mock_transport::{MockPeer, MockTransport};

/// Id of the sample `Login` api.
pub const LOGIN_ID: u32 = 7;
/// Id of the sample `Notice` notification.
pub const NOTICE_ID: u32 = 8;
/// Id of the sample `Logout` api.
pub const LOGOUT_ID: u32 = 9;

/// Payload values understood by [`TestCodec`].
#[derive(Clone, Debug, PartialEq, Eq, bincode::Encode, bincode::Decode)]
pub enum TestValue {
    /// `ReqLogin`.
    Login {
        /// User id.
        id: u32,
        /// User name.
        name: String,
    },
    /// `ResLogin`.
    LoginAck {
        /// Whether the login was accepted.
        ok: bool,
    },
    /// `MsgNotice`.
    Notice {
        /// Notice text.
        text: String,
    },
}

impl TestValue {
    /// Build a `ReqLogin` value.
    #[must_use]
    pub fn login(id: u32, name: impl Into<String>) -> Self {
        Self::Login {
            id,
            name: name.into(),
        }
    }

    /// Build a `MsgNotice` value.
    #[must_use]
    pub fn notice(text: impl Into<String>) -> Self { Self::Notice { text: text.into() } }

    /// Schema this value belongs to.
    #[must_use]
    pub fn schema(&self) -> &'static str {
        match self {
            Self::Login { .. } => "ReqLogin",
            Self::LoginAck { .. } => "ResLogin",
            Self::Notice { .. } => "MsgNotice",
        }
    }
}

/// `bincode` codec that rejects values not matching the requested schema.
#[derive(Clone, Copy, Debug, Default)]
pub struct TestCodec;

impl Codec for TestCodec {
    type Value = TestValue;

    fn encode(&self, value: &TestValue, schema: &SchemaId) -> Result<Vec<u8>, CodecError> {
        if value.schema() != schema.as_str() {
            return Err(CodecError::new(format!(
                "{} value does not match schema {schema}",
                value.schema()
            )));
        }
        encode_to_vec(value, config::standard()).map_err(|e| CodecError::new(e.to_string()))
    }

    fn decode(&self, bytes: &[u8], schema: &SchemaId) -> Result<TestValue, CodecError> {
        let (value, read) = decode_from_slice::<TestValue, _>(bytes, config::standard())
            .map_err(|e| CodecError::new(e.to_string()))?;
        if read != bytes.len() {
            return Err(CodecError::new(format!(
                "{} trailing bytes after {schema}",
                bytes.len() - read
            )));
        }
        if value.schema() != schema.as_str() {
            return Err(CodecError::new(format!(
                "expected {schema}, decoded {}",
                value.schema()
            )));
        }
        Ok(value)
    }
}

/// Registry with `Login` (api), `Notice` (notification) and `Logout` (api).
///
/// # Panics
///
/// Panics if the sample ids or names collide.
#[must_use]
pub fn sample_registry() -> ServiceMap {
    ServiceMap::new([
        ServiceDescriptor::api(LOGIN_ID, "Login", "ReqLogin", "ResLogin"),
        ServiceDescriptor::msg(NOTICE_ID, "Notice", "MsgNotice"),
        ServiceDescriptor::api(LOGOUT_ID, "Logout", "ReqLogin", "ResLogin"),
    ])
    .expect("sample services are unique")
}

/// Encode `value` with `schema` through [`TestCodec`].
///
/// # Panics
///
/// Panics if `value` does not match `schema`.
#[must_use]
pub fn encode_value(value: &TestValue, schema: &str) -> Vec<u8> {
    TestCodec
        .encode(value, &SchemaId::from(schema))
        .expect("value matches schema")
}
