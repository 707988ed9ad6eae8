//! Socket abstraction underneath a [`Connection`](crate::connection::Connection).
//!
//! A [`Transport`] moves whole messages. It knows nothing about frames or
//! services: it opens a link when asked, writes byte buffers, closes on
//! request, and reports what happens through an [`EventSender`].

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

mod event;
mod tcp;

pub use event::{CLOSE_ABNORMAL, CLOSE_NO_STATUS, CLOSE_NORMAL, EventSender, TransportEvent};
pub(crate) use event::{EventReceiver, event_channel};
pub use tcp::{DEFAULT_MAX_FRAME_LENGTH, MAX_FRAME_LENGTH, MIN_FRAME_LENGTH, TcpTransport};

/// Message-oriented, ordered, reliable link to a single peer.
///
/// Implementations report lifecycle through the [`EventSender`] handed to
/// [`Transport::connect`]:
///
/// * [`TransportEvent::Opened`] once the link can carry traffic,
/// * [`TransportEvent::Received`] for every whole inbound message, in order,
/// * [`TransportEvent::Error`] for failures, usually followed by
/// * [`TransportEvent::Closed`] when the link is gone, including as the
///   acknowledgement of [`Transport::close`].
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Start opening a link to `address`.
    ///
    /// The call returns once the attempt is under way; the outcome arrives as
    /// an event. Any previous link is discarded.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the attempt cannot be started at all.
    fn connect(
        &self,
        address: &str,
        protocols: &[String],
        events: EventSender,
    ) -> Result<(), TransportError>;

    /// Write one whole message.
    ///
    /// Concurrent sends are allowed; messages are delivered in the order the
    /// transport accepted them.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if no link is open or the write fails.
    async fn send(&self, bytes: Bytes) -> Result<(), TransportError>;

    /// Request the link be closed with a status `code` and `reason`.
    ///
    /// Completion is reported by a [`TransportEvent::Closed`] event.
    fn close(&self, code: u16, reason: &str);
}
