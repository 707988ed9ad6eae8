#![doc(html_root_url = "https://docs.rs/callwire/latest")]
//! Bidirectional api/notification RPC over a persistent framed socket.
//!
//! Both ends of a `callwire` link may call the other. A service is either an
//! *api* (request and exactly one reply) or a *msg* (one-way notification).
//! Every message on the wire is a fixed-width big-endian header followed by
//! a payload encoded by an application-supplied [`Codec`]:
//!
//! * [`SimpleHeader`]: `serviceId, sequenceId` (8 bytes), for plain
//!   clients;
//! * [`MultiplexedHeader`]: `connectionTag, reserved, messageKind,
//!   serviceId, sequenceId` (20 bytes), for links carrying many downstream
//!   peers.
//!
//! A [`Connection`] wraps a [`Transport`], tracks its
//! [`ConnectionState`], dispatches inbound frames to registered handlers
//! and correlates replies to its own outbound calls.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use callwire::{
//!     ConnectionBuilder,
//!     ServiceDescriptor,
//!     ServiceMap,
//!     connection::ClientConnection,
//! };
//! # use callwire::codec::{Codec, CodecError};
//! # use callwire::service::SchemaId;
//! # struct Utf8;
//! # impl Codec for Utf8 {
//! #     type Value = String;
//! #     fn encode(&self, v: &String, _: &SchemaId) -> Result<Vec<u8>, CodecError> {
//! #         Ok(v.clone().into_bytes())
//! #     }
//! #     fn decode(&self, b: &[u8], _: &SchemaId) -> Result<String, CodecError> {
//! #         String::from_utf8(b.to_vec()).map_err(|e| CodecError::new(e.to_string()))
//! #     }
//! # }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ServiceMap::new([
//!     ServiceDescriptor::api(1, "Echo", "Text", "Text"),
//!     ServiceDescriptor::msg(2, "Log", "Text"),
//! ])?;
//! let connection: ClientConnection<Utf8> = ConnectionBuilder::new("127.0.0.1:9000")
//!     .build_tcp(Arc::new(registry), Arc::new(Utf8));
//! connection.register_api_handler("Echo", |call| async move {
//!     let text = call.request().clone();
//!     call.succeed(text).await;
//!     Ok::<_, callwire::HandlerError>(())
//! })?;
//! connection.connect().await?;
//! let reply = connection.call("Echo", &"hello".to_owned()).await?;
//! assert_eq!(reply, "hello");
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod codec;
pub mod connection;
pub mod error;
pub mod frame;
pub mod handler;
pub mod metrics;
pub mod panic;
pub mod router;
pub mod sequence;
pub mod service;
pub mod test_helpers;
pub mod transport;

pub use call::{ApiCall, MsgCall, ReplyOutcome};
pub use codec::{ApiReturn, Codec, CodecError};
pub use connection::{Connection, ConnectionBuilder, ConnectionConfig, ConnectionState};
pub use error::{CallError, ConnectError, ErrorKind, RpcError};
pub use frame::{ConnectionTag, Frame, FrameHeader, MessageKind, MultiplexedHeader, SimpleHeader};
pub use handler::{HandlerError, HandlerTable, ImplementReport};
pub use service::{SchemaId, ServiceDescriptor, ServiceMap, ServiceRegistry};
pub use transport::{TcpTransport, Transport, TransportEvent};
