//! Metric helpers for `callwire`.
//!
//! Thin wrappers over the [`metrics`](https://docs.rs/metrics) crate. With
//! the `metrics` feature disabled every helper compiles to nothing.

/// Name of the gauge tracking open connections.
pub const CONNECTIONS_OPEN: &str = "callwire_connections_open";
/// Name of the counter tracking processed frames.
pub const FRAMES_PROCESSED: &str = "callwire_frames_processed_total";
/// Name of the counter tracking inbound frames dropped without dispatch.
pub const FRAMES_DROPPED: &str = "callwire_frames_dropped_total";
/// Name of the counter tracking handler failures and panics.
pub const HANDLER_ERRORS: &str = "callwire_handler_errors_total";
/// Name of the counter tracking failed outbound operations.
pub const ERRORS_TOTAL: &str = "callwire_errors_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Frames received from the peer.
    Inbound,
    /// Frames written to the peer.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), expect(dead_code, reason = "only used by metrics"))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the open connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    metrics::gauge!(CONNECTIONS_OPEN).increment(1.0);
}

/// Decrement the open connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    metrics::gauge!(CONNECTIONS_OPEN).decrement(1.0);
}

/// Record a processed frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    metrics::counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record an inbound frame dropped without dispatch.
pub fn inc_dropped() {
    #[cfg(feature = "metrics")]
    metrics::counter!(FRAMES_DROPPED).increment(1);
}

/// Record a failed or panicking handler.
pub fn inc_handler_errors() {
    #[cfg(feature = "metrics")]
    metrics::counter!(HANDLER_ERRORS).increment(1);
}

/// Record a failed outbound operation.
pub fn inc_errors() {
    #[cfg(feature = "metrics")]
    metrics::counter!(ERRORS_TOTAL).increment(1);
}
