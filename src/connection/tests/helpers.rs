//! Shared fixtures for connection tests.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

use crate::{
    codec::{ApiReturn, Codec},
    connection::{ClientConnection, Connection, ConnectionBuilder},
    frame::{Frame, FrameHeader, SimpleHeader},
    handler::HandlerError,
    service::SchemaId,
    test_helpers::{MockPeer, MockTransport, NOTICE_ID, TestCodec, TestValue, encode_value, sample_registry},
};

pub(super) const ADDRESS: &str = "peer.test:7000";

/// Build a connection over a fresh mock transport without connecting.
pub(super) fn build<H: FrameHeader>(
    configure: impl FnOnce(ConnectionBuilder) -> ConnectionBuilder,
) -> (Connection<TestCodec, H>, MockPeer) {
    let (transport, peer) = MockTransport::pair();
    let connection = configure(ConnectionBuilder::new(ADDRESS)).build(
        transport,
        Arc::new(sample_registry()),
        Arc::new(TestCodec),
    );
    (connection, peer)
}

/// Build and open a simple-header connection.
pub(super) async fn open_client(
    configure: impl FnOnce(ConnectionBuilder) -> ConnectionBuilder,
) -> (ClientConnection<TestCodec>, MockPeer) {
    let (connection, peer) = build(configure);
    peer.set_auto_open(true);
    connection.connect().await.expect("connect");
    (connection, peer)
}

/// Number of outbound calls still waiting for a reply.
pub(super) fn outstanding_calls<H: FrameHeader>(connection: &Connection<TestCodec, H>) -> usize {
    connection.shared.pending_calls.len()
}

/// Encode a frame with `value` under `schema`.
pub(super) fn frame_bytes<H: FrameHeader>(header: H, value: &TestValue, schema: &str) -> Bytes {
    Frame::new(header, encode_value(value, schema)).encode()
}

/// Encode an api reply as the peer would.
pub(super) fn reply_bytes<H: FrameHeader>(header: H, ret: &ApiReturn<TestValue>) -> Bytes {
    let payload = TestCodec
        .encode_return(ret, &SchemaId::from("ResLogin"))
        .expect("encode reply");
    Frame::new(header, payload).encode()
}

/// Split a written frame into its header and decoded api reply.
pub(super) fn decode_reply<H: FrameHeader>(bytes: Bytes) -> (H, ApiReturn<TestValue>) {
    let (header, payload) = Frame::<H>::decode(bytes).expect("frame").into_parts();
    let ret = TestCodec
        .decode_return(&payload, &SchemaId::from("ResLogin"))
        .expect("decode reply");
    (header, ret)
}

/// Register a `Notice` handler forwarding every body to the returned
/// receiver.
///
/// Dispatch is sequential, so once a notice delivered after some other
/// frame has been received, that earlier frame has been fully handled.
pub(super) fn notice_probe<H: FrameHeader>(
    connection: &Connection<TestCodec, H>,
) -> mpsc::UnboundedReceiver<TestValue> {
    let (tx, rx) = mpsc::unbounded_channel();
    connection
        .register_msg_handler("Notice", move |call| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(call.into_body());
                Ok::<_, HandlerError>(())
            }
        })
        .expect("register notice probe");
    rx
}

/// Deliver a notice and wait until the probe sees it.
pub(super) async fn settle(peer: &MockPeer, probe: &mut mpsc::UnboundedReceiver<TestValue>) {
    peer.deliver(frame_bytes(
        SimpleHeader::new(NOTICE_ID, 1),
        &TestValue::notice("barrier"),
        "MsgNotice",
    ));
    let seen = probe.recv().await.expect("probe open");
    assert_eq!(seen, TestValue::notice("barrier"));
}

/// Counter plus a callback factory incrementing it.
pub(super) fn counting_hook() -> (Arc<AtomicUsize>, impl Fn() -> BoxFuture<'static, ()> + Clone) {
    let count = Arc::new(AtomicUsize::new(0));
    let hook_count = Arc::clone(&count);
    let increment = move || {
        let count = Arc::clone(&hook_count);
        let fut: BoxFuture<'static, ()> = Box::pin(async move {
            count.fetch_add(1, Ordering::SeqCst);
        });
        fut
    };
    (count, increment)
}
