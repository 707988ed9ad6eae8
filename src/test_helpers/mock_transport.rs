//! Scriptable in-memory [`Transport`].
//!
//! The connection under test sees a [`MockTransport`]; the test drives the
//! other side through the paired [`MockPeer`].

use std::{
    io,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::{
    error::TransportError,
    transport::{EventSender, Transport},
};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct Script {
    auto_open: bool,
    acknowledge_close: bool,
    fail_connect: bool,
    fail_sends: bool,
    events: Option<EventSender>,
    connects: Vec<(String, Vec<String>)>,
    closes: Vec<(u16, String)>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            auto_open: false,
            acknowledge_close: true,
            fail_connect: false,
            fail_sends: false,
            events: None,
            connects: Vec::new(),
            closes: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Inner {
    script: Mutex<Script>,
    sent: mpsc::UnboundedSender<Bytes>,
}

impl Inner {
    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Transport half handed to the connection.
#[derive(Debug)]
pub struct MockTransport {
    inner: Arc<Inner>,
}

/// Test-side controller for a [`MockTransport`].
#[derive(Debug)]
pub struct MockPeer {
    inner: Arc<Inner>,
    sent: mpsc::UnboundedReceiver<Bytes>,
}

impl MockTransport {
    /// Create a transport and its controller.
    ///
    /// By default connect attempts stay pending until [`MockPeer::open`],
    /// and `close` is acknowledged immediately.
    #[must_use]
    pub fn pair() -> (Arc<Self>, MockPeer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            script: Mutex::new(Script::default()),
            sent: tx,
        });
        (
            Arc::new(Self {
                inner: Arc::clone(&inner),
            }),
            MockPeer { inner, sent: rx },
        )
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn connect(
        &self,
        address: &str,
        protocols: &[String],
        events: EventSender,
    ) -> Result<(), TransportError> {
        let mut script = self.inner.script();
        script
            .connects
            .push((address.to_owned(), protocols.to_vec()));
        if script.fail_connect {
            return Err(io::Error::from(io::ErrorKind::ConnectionRefused).into());
        }
        if script.auto_open {
            events.opened();
        }
        script.events = Some(events);
        Ok(())
    }

    async fn send(&self, bytes: Bytes) -> Result<(), TransportError> {
        if self.inner.script().fail_sends {
            return Err(TransportError::Closed);
        }
        self.inner
            .sent
            .send(bytes)
            .map_err(|_| TransportError::Closed)
    }

    fn close(&self, code: u16, reason: &str) {
        let mut script = self.inner.script();
        script.closes.push((code, reason.to_owned()));
        if script.acknowledge_close {
            if let Some(events) = &script.events {
                events.closed(code, reason);
            }
        }
    }
}

impl MockPeer {
    fn events(&self) -> EventSender {
        self.inner
            .script()
            .events
            .clone()
            .expect("connect has been called")
    }

    /// Open connect attempts as soon as they start.
    pub fn set_auto_open(&self, enabled: bool) { self.inner.script().auto_open = enabled; }

    /// Whether `close` reports a close event.
    pub fn set_acknowledge_close(&self, enabled: bool) {
        self.inner.script().acknowledge_close = enabled;
    }

    /// Make `connect` fail synchronously.
    pub fn set_fail_connect(&self, enabled: bool) { self.inner.script().fail_connect = enabled; }

    /// Make every `send` fail.
    pub fn set_fail_sends(&self, enabled: bool) { self.inner.script().fail_sends = enabled; }

    /// Report that the link opened.
    ///
    /// # Panics
    ///
    /// Panics if no connect attempt was made.
    pub fn open(&self) { self.events().opened(); }

    /// Report that the link closed.
    ///
    /// # Panics
    ///
    /// Panics if no connect attempt was made.
    pub fn close(&self, code: u16, reason: &str) { self.events().closed(code, reason); }

    /// Report a link failure.
    ///
    /// # Panics
    ///
    /// Panics if no connect attempt was made.
    pub fn fail(&self, error: TransportError) { self.events().error(error); }

    /// Deliver an inbound message.
    ///
    /// # Panics
    ///
    /// Panics if no connect attempt was made.
    pub fn deliver(&self, bytes: impl Into<Bytes>) { self.events().received(bytes.into()); }

    /// Event sender of the most recent connect attempt.
    ///
    /// # Panics
    ///
    /// Panics if no connect attempt was made.
    #[must_use]
    pub fn attempt_events(&self) -> EventSender { self.events() }

    /// Wait for the next message written by the connection.
    ///
    /// # Panics
    ///
    /// Panics if nothing is written within five seconds.
    pub async fn next_sent(&mut self) -> Bytes {
        tokio::time::timeout(RECV_TIMEOUT, self.sent.recv())
            .await
            .expect("timed out waiting for a sent message")
            .expect("transport dropped")
    }

    /// Take a written message if one is already queued.
    pub fn try_next_sent(&mut self) -> Option<Bytes> { self.sent.try_recv().ok() }

    /// Number of connect attempts made.
    #[must_use]
    pub fn connect_calls(&self) -> usize { self.inner.script().connects.len() }

    /// Address and protocols of every connect attempt.
    #[must_use]
    pub fn connects(&self) -> Vec<(String, Vec<String>)> { self.inner.script().connects.clone() }

    /// Code and reason of every close request.
    #[must_use]
    pub fn closes(&self) -> Vec<(u16, String)> { self.inner.script().closes.clone() }
}
