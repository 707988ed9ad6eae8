//! Outbound calls, notifications and bulk handler registration.

use std::{sync::atomic::Ordering, time::Duration};

use bytes::Bytes;
use rstest::rstest;

use super::helpers::{build, counting_hook, open_client, outstanding_calls, reply_bytes};
use crate::{
    call::ApiCall,
    codec::ApiReturn,
    connection::{ClientConnection, ConnectionState, GatewayConnection},
    error::{CallError, RpcError},
    frame::{ConnectionTag, Frame, FrameHeader, MessageKind, SimpleHeader},
    handler::{HandlerError, HandlerTable},
    test_helpers::{LOGIN_ID, TestCodec, TestValue, encode_value},
    transport::CLOSE_ABNORMAL,
};

#[tokio::test]
async fn call_resolves_with_correlated_reply() {
    let (connection, mut peer) = open_client(|b| b).await;

    let request = TestValue::login(42, "ada");
    let (result, ()) = tokio::join!(connection.call("Login", &request), async {
        let (header, payload) = Frame::<SimpleHeader>::decode(peer.next_sent().await)
            .expect("request frame")
            .into_parts();
        assert_eq!(header, SimpleHeader::new(LOGIN_ID, 1));
        assert_eq!(&payload[..], encode_value(&TestValue::login(42, "ada"), "ReqLogin"));
        peer.deliver(reply_bytes(
            header,
            &ApiReturn::Success(TestValue::LoginAck { ok: true }),
        ));
    });

    assert_eq!(result.expect("call"), TestValue::LoginAck { ok: true });
}

#[tokio::test]
async fn sequence_advances_per_call() {
    let (connection, mut peer) = open_client(|b| b).await;

    for expected in 1..=3 {
        let request = TestValue::login(1, "a");
        let (result, ()) = tokio::join!(connection.call("Login", &request), async {
            let frame = Frame::<SimpleHeader>::decode(peer.next_sent().await).expect("frame");
            assert_eq!(frame.header().sequence_id(), expected);
            peer.deliver(reply_bytes(
                *frame.header(),
                &ApiReturn::Success(TestValue::LoginAck { ok: true }),
            ));
        });
        result.expect("call");
    }
}

#[tokio::test]
async fn remote_failure_surfaces_as_remote_error() {
    let (connection, mut peer) = open_client(|b| b).await;

    let request = TestValue::login(1, "a");
    let (result, ()) = tokio::join!(connection.call("Login", &request), async {
        let frame = Frame::<SimpleHeader>::decode(peer.next_sent().await).expect("frame");
        peer.deliver(reply_bytes(
            *frame.header(),
            &ApiReturn::Failure(RpcError::api("banned").with_code("BANNED")),
        ));
    });

    match result {
        Err(CallError::Remote(error)) => {
            assert_eq!(error.message(), "banned");
            assert_eq!(error.code(), Some("BANNED"));
        }
        other => panic!("unexpected call outcome: {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn call_times_out_without_reply() {
    let (connection, mut peer) = open_client(|b| b.call_timeout_ms(Some(50))).await;

    let request = TestValue::login(1, "a");
    let result = connection.call("Login", &request).await;

    assert!(matches!(result, Err(CallError::Timeout)), "{result:?}");
    assert_eq!(outstanding_calls(&connection), 0);
    let _ = peer.next_sent().await;
}

#[tokio::test(start_paused = true)]
async fn cancelled_calls_release_their_slots() {
    let (connection, mut peer) = open_client(|b| b).await;

    for _ in 0..50 {
        let request = TestValue::login(1, "a");
        let call = connection.call("Login", &request);
        assert!(
            tokio::time::timeout(Duration::from_millis(1), call)
                .await
                .is_err()
        );
    }

    assert_eq!(outstanding_calls(&connection), 0);
    for expected in 1..=50 {
        let frame = Frame::<SimpleHeader>::decode(peer.next_sent().await).expect("frame");
        assert_eq!(frame.header().sequence_id(), expected);
    }
}

#[tokio::test]
async fn late_reply_to_cancelled_call_is_ignored() {
    let (connection, mut peer) = open_client(|b| b).await;
    let request = TestValue::login(1, "a");
    let call = connection.call("Login", &request);
    assert!(
        tokio::time::timeout(Duration::from_millis(10), call)
            .await
            .is_err()
    );

    let header = *Frame::<SimpleHeader>::decode(peer.next_sent().await)
        .expect("frame")
        .header();
    peer.deliver(reply_bytes(
        header,
        &ApiReturn::Failure(RpcError::api("late")),
    ));

    let request = TestValue::login(2, "b");
    let (result, ()) = tokio::join!(connection.call("Login", &request), async {
        let frame = Frame::<SimpleHeader>::decode(peer.next_sent().await).expect("frame");
        assert_eq!(frame.header().sequence_id(), 2);
        peer.deliver(reply_bytes(
            *frame.header(),
            &ApiReturn::Success(TestValue::LoginAck { ok: false }),
        ));
    });
    assert_eq!(result.expect("call"), TestValue::LoginAck { ok: false });
}

#[tokio::test]
async fn undecodable_reply_fails_the_call() {
    let (connection, mut peer) = open_client(|b| b).await;

    let request = TestValue::login(1, "a");
    let (result, ()) = tokio::join!(connection.call("Login", &request), async {
        let frame = Frame::<SimpleHeader>::decode(peer.next_sent().await).expect("frame");
        peer.deliver(Frame::new(*frame.header(), Bytes::from_static(&[0xff, 0xff, 0xff])).encode());
    });

    assert!(matches!(result, Err(CallError::Codec(_))), "{result:?}");
    assert_eq!(outstanding_calls(&connection), 0);
}

#[tokio::test]
async fn close_fails_outstanding_calls() {
    let (connection, mut peer) = open_client(|b| b).await;

    let request = TestValue::login(1, "a");
    let (result, ()) = tokio::join!(connection.call("Login", &request), async {
        let _ = peer.next_sent().await;
        peer.close(CLOSE_ABNORMAL, "reset");
    });

    assert!(matches!(result, Err(CallError::Disconnected)), "{result:?}");
    assert_eq!(connection.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn send_msg_writes_simple_frame() {
    let (connection, mut peer) = open_client(|b| b).await;

    connection
        .send_msg("Notice", &TestValue::notice("hello"))
        .await
        .expect("send");

    let sent = peer.next_sent().await;
    assert_eq!(&sent[..8], &[0, 0, 0, 8, 0, 0, 0, 1]);
    assert_eq!(&sent[8..], encode_value(&TestValue::notice("hello"), "MsgNotice"));
}

#[tokio::test]
async fn gateway_send_msg_writes_multiplexed_frame() {
    let (connection, mut peer): (GatewayConnection<TestCodec>, _) = build(|b| b);
    peer.set_auto_open(true);
    connection.connect().await.expect("connect");

    connection
        .send_msg(
            ConnectionTag::new(5),
            MessageKind::new(3),
            "Notice",
            &TestValue::notice("hi"),
        )
        .await
        .expect("send");

    let sent = peer.next_sent().await;
    assert_eq!(
        &sent[..20],
        &[0, 0, 0, 5, 0, 0, 0, 0, 0, 0, 0, 3, 0, 0, 0, 8, 0, 0, 0, 1]
    );
}

#[rstest]
#[case::unknown_service("Shutdown", true)]
#[case::not_an_api("Notice", true)]
#[case::not_a_msg("Login", false)]
#[tokio::test]
async fn lookup_errors_are_reported(#[case] name: &str, #[case] as_call: bool) {
    let (errors, on_error) = counting_hook();
    let (connection, _peer) = open_client(|b| b.on_error(move |_: &CallError| on_error())).await;

    let result = if as_call {
        connection
            .call(name, &TestValue::login(1, "a"))
            .await
            .map(drop)
    } else {
        connection.send_msg(name, &TestValue::notice("x")).await
    };

    match (name, result) {
        ("Shutdown", Err(CallError::UnknownService(service)))
        | ("Notice", Err(CallError::NotAnApi(service)))
        | ("Login", Err(CallError::NotAMsg(service))) => assert_eq!(service, name),
        (_, other) => panic!("unexpected outcome for {name}: {other:?}"),
    }
    assert_eq!(errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn calls_fail_while_closed() {
    let (errors, on_error) = counting_hook();
    let (connection, mut peer): (ClientConnection<TestCodec>, _) =
        build(|b| b.on_error(move |_: &CallError| on_error()));

    let request = TestValue::login(1, "a");
    let call = connection.call("Login", &request).await;
    let msg = connection.send_msg("Notice", &TestValue::notice("x")).await;

    assert!(matches!(call, Err(CallError::NotConnected)), "{call:?}");
    assert!(matches!(msg, Err(CallError::NotConnected)), "{msg:?}");
    assert_eq!(errors.load(Ordering::SeqCst), 2);
    assert!(peer.try_next_sent().is_none());
}

#[tokio::test]
async fn transport_send_failure_is_reported() {
    let (connection, peer) = open_client(|b| b).await;
    peer.set_fail_sends(true);

    let result = connection.send_msg("Notice", &TestValue::notice("x")).await;

    assert!(matches!(result, Err(CallError::Send(_))), "{result:?}");
}

#[tokio::test]
async fn implement_all_reports_missing_apis() {
    let (connection, _peer): (ClientConnection<TestCodec>, _) = build(|b| b);
    let table = HandlerTable::new().with_api(
        "Login",
        |call: ApiCall<TestCodec, SimpleHeader>| async move {
            call.succeed(TestValue::LoginAck { ok: true }).await;
            Ok::<_, HandlerError>(())
        },
    );

    let report = connection.implement_all(&table);

    assert_eq!(report.succeeded(), ["Login".to_owned()]);
    assert_eq!(report.failed().len(), 1);
    assert_eq!(report.failed()[0].service, "Logout");
    assert_eq!(report.failed()[0].reason, "Api not implemented: Logout");
    assert!(!report.is_complete());
    assert!(connection.has_api_handler("Login"));
    assert!(!connection.has_msg_handler("Notice"));
}

#[tokio::test]
async fn implement_all_keeps_existing_handlers() {
    let (connection, _peer): (ClientConnection<TestCodec>, _) = build(|b| b);
    for name in ["Login", "Logout"] {
        connection
            .register_api_handler(name, |_call| async { Ok::<_, HandlerError>(()) })
            .expect("register");
    }

    let report = connection.implement_all(&HandlerTable::new());

    assert!(report.is_complete());
    assert_eq!(report.succeeded(), ["Login".to_owned(), "Logout".to_owned()]);
}
