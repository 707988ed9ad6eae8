#![cfg(feature = "metrics")]
//! Tests for `callwire` metrics.
//!
//! These tests verify that counters and gauges update as expected using
//! `metrics_util::debugging::DebuggingRecorder`.

mod common;

use callwire::metrics::{
    CONNECTIONS_OPEN,
    Direction,
    ERRORS_TOTAL,
    FRAMES_DROPPED,
    FRAMES_PROCESSED,
    HANDLER_ERRORS,
};
use common::{Peer, client, listener};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use rstest::rstest;

/// Creates a debugging recorder and snapshotter for metrics testing.
fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

fn counter(snapshotter: &Snapshotter, name: &str, direction: Option<&str>) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(k, _, _, _)| {
            k.key().name() == name
                && direction.is_none_or(|dir| {
                    k.key()
                        .labels()
                        .any(|l| l.key() == "direction" && l.value() == dir)
                })
        })
        .map(|(_, _, _, v)| match v {
            DebugValue::Counter(c) => c,
            _ => 0,
        })
        .sum()
}

fn gauge(snapshotter: &Snapshotter, name: &str) -> Option<f64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find(|(k, _, _, _)| k.key().name() == name)
        .and_then(|(_, _, _, v)| match v {
            DebugValue::Gauge(g) => Some(g.into_inner()),
            _ => None,
        })
}

#[rstest]
#[case::inbound(Direction::Inbound, "inbound")]
#[case::outbound(Direction::Outbound, "outbound")]
fn frame_metric_is_labelled_by_direction(#[case] direction: Direction, #[case] label: &str) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        callwire::metrics::inc_frames(direction);
    });

    assert_eq!(counter(&snapshotter, FRAMES_PROCESSED, Some(label)), 1);
}

#[rstest]
#[case::dropped(callwire::metrics::inc_dropped as fn(), FRAMES_DROPPED)]
#[case::handler_errors(callwire::metrics::inc_handler_errors as fn(), HANDLER_ERRORS)]
#[case::errors(callwire::metrics::inc_errors as fn(), ERRORS_TOTAL)]
fn counters_increment(#[case] record: fn(), #[case] name: &str) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, record);

    assert_eq!(counter(&snapshotter, name, None), 1);
}

#[test]
fn connection_gauge_tracks_open_links() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");

    metrics::with_local_recorder(&recorder, || {
        runtime.block_on(async {
            let (listener, addr) = listener().await;
            let connection = client(addr, |b| b);
            let (connected, mut peer) = tokio::join!(connection.connect(), Peer::accept(&listener));
            connected.expect("connect");
            assert_eq!(gauge(&snapshotter, CONNECTIONS_OPEN), Some(1.0));

            connection
                .send_msg("Log", &"metered".to_owned())
                .await
                .expect("send");
            let _ = peer.recv().await;

            connection.disconnect().await;
        });
    });

    assert_eq!(gauge(&snapshotter, CONNECTIONS_OPEN), Some(0.0));
    assert_eq!(counter(&snapshotter, FRAMES_PROCESSED, Some("outbound")), 1);
}
