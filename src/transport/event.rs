//! Transport lifecycle events and the channel carrying them.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
/// Closed without a status code.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Closed without a close handshake.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Something that happened on a transport link.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    /// The link is ready to carry traffic.
    Opened,
    /// The link is gone.
    Closed {
        /// Close status code.
        code: u16,
        /// Human-readable close reason.
        reason: String,
    },
    /// The link failed.
    Error(TransportError),
    /// One whole inbound message.
    Received(Bytes),
}

pub(crate) type EventReceiver = mpsc::UnboundedReceiver<(u64, TransportEvent)>;

/// Handle a transport uses to report events for one connection attempt.
///
/// Every attempt gets its own sender; events from an attempt that has since
/// been replaced are discarded by the receiving connection.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
    attempt: u64,
}

pub(crate) fn event_channel() -> (mpsc::UnboundedSender<(u64, TransportEvent)>, EventReceiver) {
    mpsc::unbounded_channel()
}

impl EventSender {
    pub(crate) fn new(tx: mpsc::UnboundedSender<(u64, TransportEvent)>, attempt: u64) -> Self {
        Self { tx, attempt }
    }

    /// Report an event. Events sent after the connection is gone are
    /// discarded.
    pub fn emit(&self, event: TransportEvent) {
        if self.tx.send((self.attempt, event)).is_err() {
            log::trace!("transport event discarded: connection dropped");
        }
    }

    /// Report that the link opened.
    pub fn opened(&self) { self.emit(TransportEvent::Opened); }

    /// Report that the link closed.
    pub fn closed(&self, code: u16, reason: impl Into<String>) {
        self.emit(TransportEvent::Closed {
            code,
            reason: reason.into(),
        });
    }

    /// Report a link failure.
    pub fn error(&self, error: TransportError) { self.emit(TransportEvent::Error(error)); }

    /// Deliver one whole inbound message.
    pub fn received(&self, bytes: Bytes) { self.emit(TransportEvent::Received(bytes)); }

    /// Returns `true` once the receiving connection has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.tx.is_closed() }
}
