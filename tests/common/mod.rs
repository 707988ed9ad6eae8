//! Shared utilities for integration tests.
//!
//! Provides a UTF-8 payload codec, a two-service registry and a loopback
//! TCP peer speaking the length-delimited simple-header wire format.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use bytes::Bytes;
use callwire::{
    ApiReturn,
    Codec,
    CodecError,
    ConnectionBuilder,
    Frame,
    FrameHeader,
    SchemaId,
    ServiceDescriptor,
    ServiceMap,
    SimpleHeader,
    connection::ClientConnection,
};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

pub const ECHO_ID: u32 = 1;
pub const LOG_ID: u32 = 2;

const PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// Payloads are plain UTF-8 text for every schema.
#[derive(Clone, Copy, Debug, Default)]
pub struct Utf8Codec;

impl Codec for Utf8Codec {
    type Value = String;

    fn encode(&self, value: &String, _schema: &SchemaId) -> Result<Vec<u8>, CodecError> {
        Ok(value.clone().into_bytes())
    }

    fn decode(&self, bytes: &[u8], schema: &SchemaId) -> Result<String, CodecError> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CodecError::new(format!("{schema} is not UTF-8: {e}")))
    }
}

/// `Echo` api and `Log` notification.
#[expect(
    clippy::expect_used,
    reason = "fixed sample services never collide"
)]
pub fn registry() -> Arc<ServiceMap> {
    Arc::new(
        ServiceMap::new([
            ServiceDescriptor::api(ECHO_ID, "Echo", "Text", "Text"),
            ServiceDescriptor::msg(LOG_ID, "Log", "Text"),
        ])
        .expect("unique services"),
    )
}

/// Bind a listener on an ephemeral localhost port.
#[expect(
    clippy::expect_used,
    reason = "binding to an ephemeral localhost port must abort the test immediately"
)]
pub async fn listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("listener address");
    (listener, addr)
}

/// Build a TCP client connection to `addr`.
pub fn client(
    addr: SocketAddr,
    configure: impl FnOnce(ConnectionBuilder) -> ConnectionBuilder,
) -> ClientConnection<Utf8Codec> {
    configure(ConnectionBuilder::new(addr.to_string())).build_tcp(registry(), Arc::new(Utf8Codec))
}

/// Encode an api reply the way the connection expects it.
#[expect(clippy::expect_used, reason = "test fixture")]
pub fn reply_payload(ret: &ApiReturn<String>) -> Vec<u8> {
    Utf8Codec
        .encode_return(ret, &SchemaId::from("Text"))
        .expect("encode reply")
}

/// Decode an api reply written by the connection.
#[expect(clippy::expect_used, reason = "test fixture")]
pub fn decode_reply(payload: &[u8]) -> ApiReturn<String> {
    Utf8Codec
        .decode_return(payload, &SchemaId::from("Text"))
        .expect("decode reply")
}

/// Server side of a loopback link.
pub struct Peer {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl Peer {
    /// Accept the next connection on `listener`.
    #[expect(clippy::expect_used, reason = "test fixture")]
    pub async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = tokio::time::timeout(PEER_TIMEOUT, listener.accept())
            .await
            .expect("client connected in time")
            .expect("accept");
        Self {
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
        }
    }

    /// Read the next frame written by the client.
    #[expect(clippy::expect_used, reason = "test fixture")]
    pub async fn recv(&mut self) -> (SimpleHeader, Bytes) {
        let bytes = self.next().await.expect("client closed the link");
        Frame::<SimpleHeader>::decode(bytes)
            .expect("well-formed frame")
            .into_parts()
    }

    /// Read the next message, or `None` once the client closed the link.
    #[expect(clippy::expect_used, reason = "test fixture")]
    pub async fn next(&mut self) -> Option<Bytes> {
        tokio::time::timeout(PEER_TIMEOUT, self.framed.next())
            .await
            .expect("peer read timed out")
            .map(|frame| frame.expect("read frame").freeze())
    }

    /// Write a frame to the client.
    #[expect(clippy::expect_used, reason = "test fixture")]
    pub async fn send(&mut self, service_id: u32, sequence_id: u32, payload: impl Into<Bytes>) {
        let frame = Frame::new(SimpleHeader::new(service_id, sequence_id), payload);
        self.framed.send(frame.encode()).await.expect("write frame");
    }

    /// Header fields of `header`.
    pub fn ids(header: &SimpleHeader) -> (u32, u32) { (header.service_id(), header.sequence_id()) }
}
