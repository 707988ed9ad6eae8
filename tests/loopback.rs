//! End-to-end tests over a real TCP socket.
//!
//! A plain `tokio` listener plays the peer, speaking length-delimited
//! frames with the 8-byte header.

mod common;

use std::time::Duration;

use callwire::{
    ApiCall,
    ApiReturn,
    CallError,
    ConnectError,
    ConnectionState,
    HandlerError,
    RpcError,
    SimpleHeader,
};
use common::{ECHO_ID, LOG_ID, Peer, Utf8Codec, client, decode_reply, listener, reply_payload};
use tokio::sync::mpsc;

#[tokio::test]
async fn call_round_trips_over_tcp() {
    let (listener, addr) = listener().await;
    let connection = client(addr, |b| b);

    let (connected, mut peer) = tokio::join!(connection.connect(), Peer::accept(&listener));
    connected.expect("connect");
    assert_eq!(connection.state(), ConnectionState::Opened);

    let request = "ping".to_owned();
    let (reply, ()) = tokio::join!(connection.call("Echo", &request), async {
        let (header, payload) = peer.recv().await;
        assert_eq!(Peer::ids(&header), (ECHO_ID, 1));
        assert_eq!(&payload[..], b"ping");
        peer.send(
            ECHO_ID,
            1,
            reply_payload(&ApiReturn::Success("pong".to_owned())),
        )
        .await;
    });

    assert_eq!(reply.expect("call"), "pong");
}

#[tokio::test]
async fn peer_request_is_answered() {
    let (listener, addr) = listener().await;
    let connection = client(addr, |b| b);
    connection
        .register_api_handler("Echo", |call: ApiCall<Utf8Codec, SimpleHeader>| async move {
            let text = call.request().to_uppercase();
            call.succeed(text).await;
            Ok::<_, HandlerError>(())
        })
        .expect("register");

    let (connected, mut peer) = tokio::join!(connection.connect(), Peer::accept(&listener));
    connected.expect("connect");

    peer.send(ECHO_ID, 41, "quiet").await;
    let (header, payload) = peer.recv().await;

    assert_eq!(Peer::ids(&header), (ECHO_ID, 41));
    assert_eq!(decode_reply(&payload), ApiReturn::Success("QUIET".to_owned()));
}

#[tokio::test]
async fn remote_error_reaches_caller() {
    let (listener, addr) = listener().await;
    let connection = client(addr, |b| b);
    let (connected, mut peer) = tokio::join!(connection.connect(), Peer::accept(&listener));
    connected.expect("connect");

    let request = "x".to_owned();
    let (reply, ()) = tokio::join!(connection.call("Echo", &request), async {
        let _ = peer.recv().await;
        peer.send(
            ECHO_ID,
            1,
            reply_payload(&ApiReturn::Failure(RpcError::api("refused"))),
        )
        .await;
    });

    match reply {
        Err(CallError::Remote(error)) => assert_eq!(error.message(), "refused"),
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn notification_is_written_without_reply() {
    let (listener, addr) = listener().await;
    let connection = client(addr, |b| b);
    let (connected, mut peer) = tokio::join!(connection.connect(), Peer::accept(&listener));
    connected.expect("connect");

    connection
        .send_msg("Log", &"started".to_owned())
        .await
        .expect("send");

    let (header, payload) = peer.recv().await;
    assert_eq!(Peer::ids(&header), (LOG_ID, 1));
    assert_eq!(&payload[..], b"started");
}

#[tokio::test]
async fn peer_hangup_reports_lost_connection() {
    let (listener, addr) = listener().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let connection = client(addr, |b| {
        b.on_connection_lost(move |code, reason| {
            let tx = tx.clone();
            async move {
                let _ = tx.send((code, reason));
            }
        })
    });
    let (connected, peer) = tokio::join!(connection.connect(), Peer::accept(&listener));
    connected.expect("connect");

    drop(peer);

    let (code, _reason) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("lost hook in time")
        .expect("lost hook fired");
    assert_eq!(code, callwire::transport::CLOSE_ABNORMAL);
    assert_eq!(connection.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn disconnect_closes_the_socket() {
    let (listener, addr) = listener().await;
    let connection = client(addr, |b| b);
    let (connected, mut peer) = tokio::join!(connection.connect(), Peer::accept(&listener));
    connected.expect("connect");

    connection.disconnect().await;

    assert_eq!(connection.state(), ConnectionState::Closed);
    assert!(peer.next().await.is_none(), "peer should observe EOF");
}

#[tokio::test]
async fn refused_connection_fails_connect() {
    let (listener, addr) = listener().await;
    drop(listener);
    let connection = client(addr, |b| b);

    let connected = connection.connect().await;

    assert!(
        matches!(connected, Err(ConnectError::Failed { .. })),
        "unexpected connect outcome: {connected:?}"
    );
    assert_eq!(connection.state(), ConnectionState::Closed);
}
