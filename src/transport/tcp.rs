//! TCP transport with length-delimited message boundaries.
//!
//! Each message is carried behind a 4-byte big-endian length prefix, which
//! gives the connection the whole-message delivery it relies on.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use super::{CLOSE_ABNORMAL, EventSender, Transport};
use crate::error::TransportError;

/// Smallest accepted message length limit.
pub const MIN_FRAME_LENGTH: usize = 64;
/// Largest accepted message length limit (16 MiB).
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;
/// Message length limit used when none is configured.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = MAX_FRAME_LENGTH;

type WriteRequest = (Bytes, oneshot::Sender<Result<(), TransportError>>);

struct Link {
    writes: mpsc::UnboundedSender<WriteRequest>,
    events: EventSender,
    task: JoinHandle<()>,
}

/// [`Transport`] over a single `TcpStream`.
///
/// # Examples
///
/// ```
/// use callwire::transport::{MAX_FRAME_LENGTH, TcpTransport};
///
/// let transport = TcpTransport::new(usize::MAX);
/// assert_eq!(transport.max_frame_length(), MAX_FRAME_LENGTH);
/// ```
pub struct TcpTransport {
    max_frame_length: usize,
    link: Mutex<Option<Link>>,
}

impl TcpTransport {
    /// Create a transport accepting messages up to `max_frame_length` bytes.
    ///
    /// The limit is clamped to `MIN_FRAME_LENGTH..=MAX_FRAME_LENGTH`.
    #[must_use]
    pub fn new(max_frame_length: usize) -> Self {
        let clamped = max_frame_length.clamp(MIN_FRAME_LENGTH, MAX_FRAME_LENGTH);
        if clamped != max_frame_length {
            log::warn!(
                "max frame length out of range; clamping to {clamped} bytes \
                 (requested={max_frame_length})"
            );
        }
        Self {
            max_frame_length: clamped,
            link: Mutex::new(None),
        }
    }

    /// Effective message length limit.
    #[must_use]
    pub fn max_frame_length(&self) -> usize { self.max_frame_length }

    fn codec(&self) -> LengthDelimitedCodec {
        LengthDelimitedCodec::builder()
            .max_frame_length(self.max_frame_length)
            .new_codec()
    }

    fn replace_link(&self, link: Option<Link>) -> Option<Link> {
        let mut guard = self.link.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, link)
    }
}

impl Default for TcpTransport {
    fn default() -> Self { Self::new(DEFAULT_MAX_FRAME_LENGTH) }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Some(link) = self.replace_link(None) {
            link.task.abort();
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn connect(
        &self,
        address: &str,
        protocols: &[String],
        events: EventSender,
    ) -> Result<(), TransportError> {
        if !protocols.is_empty() {
            log::debug!("tcp transport ignores sub-protocols {protocols:?}");
        }
        let (writes, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_link(
            address.to_owned(),
            self.codec(),
            rx,
            events.clone(),
        ));
        if let Some(previous) = self.replace_link(Some(Link {
            writes,
            events,
            task,
        })) {
            previous.task.abort();
        }
        Ok(())
    }

    async fn send(&self, bytes: Bytes) -> Result<(), TransportError> {
        let writes = {
            let guard = self.link.lock().unwrap_or_else(PoisonError::into_inner);
            guard
                .as_ref()
                .map(|link| link.writes.clone())
                .ok_or(TransportError::NotConnected)?
        };
        let (ack_tx, ack_rx) = oneshot::channel();
        writes
            .send((bytes, ack_tx))
            .map_err(|_| TransportError::Closed)?;
        ack_rx.await.map_err(|_| TransportError::Closed)?
    }

    fn close(&self, code: u16, reason: &str) {
        if let Some(link) = self.replace_link(None) {
            link.task.abort();
            link.events.closed(code, reason);
        }
    }
}

async fn run_link(
    address: String,
    codec: LengthDelimitedCodec,
    mut writes: mpsc::UnboundedReceiver<WriteRequest>,
    events: EventSender,
) {
    let stream = match TcpStream::connect(&address).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::debug!(peer.addr = %address, error = %e, "tcp connect failed");
            events.error(e.into());
            events.closed(CLOSE_ABNORMAL, "connect failed");
            return;
        }
    };
    if let Err(e) = stream.set_nodelay(true) {
        log::debug!("failed to set TCP_NODELAY: error={e}");
    }
    let mut framed = Framed::new(stream, codec);
    events.opened();

    loop {
        tokio::select! {
            request = writes.recv() => {
                let Some((bytes, ack)) = request else { return };
                let result = framed.send(bytes).await.map_err(TransportError::from);
                let failure = result.as_ref().err().cloned();
                let _ = ack.send(result);
                if let Some(e) = failure {
                    events.error(e);
                    events.closed(CLOSE_ABNORMAL, "write failed");
                    return;
                }
            }
            inbound = framed.next() => match inbound {
                Some(Ok(message)) => events.received(message.freeze()),
                Some(Err(e)) => {
                    events.error(e.into());
                    events.closed(CLOSE_ABNORMAL, "read failed");
                    return;
                }
                None => {
                    events.closed(CLOSE_ABNORMAL, "peer closed the connection");
                    return;
                }
            },
        }
    }
}
