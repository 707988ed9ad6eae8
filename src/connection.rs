//! Connection state machine, call dispatch and outbound calls.
//!
//! A [`Connection`] owns one logical link to a peer on top of a
//! [`Transport`]. It moves through [`ConnectionState`] in response to
//! `connect`, `disconnect` and transport events, dispatches inbound frames
//! to registered handlers, and correlates replies to its own outbound calls.
//!
//! All inbound work for one connection runs on a single driver task, in
//! the order the transport delivered it. Handlers are awaited one at a
//! time: a handler that awaits an outbound `call` on the same connection
//! will never see the reply.

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::{mpsc, oneshot};

use crate::{
    codec::Codec,
    error::{CallError, ConnectError, RegistrationError},
    frame::{FrameHeader, MultiplexedHeader, SimpleHeader},
    handler::{ApiHandler, HandlerSource, ImplementReport, MsgHandler, api_handler, msg_handler},
    router::ServiceRouter,
    sequence::SequenceCounter,
    transport::{EventReceiver, EventSender, Transport, TransportEvent},
};

mod builder;
mod config;
mod dispatch;
mod driver;
mod hooks;
mod outbound;
mod pending;
mod state;

pub use builder::ConnectionBuilder;
pub use config::ConnectionConfig;
pub use hooks::{CallErrorHandler, ConnectionLostHandler};
use hooks::LifecycleHooks;
use pending::{Pending, Waiter};
pub use state::ConnectionState;
use state::LinkState;

/// Connection speaking the 8-byte header to a single upstream peer.
pub type ClientConnection<C> = Connection<C, SimpleHeader>;

/// Connection speaking the 20-byte header on behalf of many downstream
/// peers.
pub type GatewayConnection<C> = Connection<C, MultiplexedHeader>;

type ReplySender<V> = oneshot::Sender<Result<V, CallError>>;

pub(crate) struct Shared<C: Codec, H: FrameHeader> {
    config: ConnectionConfig,
    transport: Arc<dyn Transport>,
    router: ServiceRouter<C>,
    hooks: LifecycleHooks,
    link: Mutex<LinkState>,
    events_tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
    events_rx: Mutex<Option<EventReceiver>>,
    sequence: Mutex<SequenceCounter>,
    msg_sequence: Mutex<SequenceCounter>,
    pending_calls: DashMap<(u32, u32), ReplySender<C::Value>>,
    api_handlers: DashMap<String, ApiHandler<C, H>>,
    msg_handlers: DashMap<String, MsgHandler<C, H>>,
}

impl<C: Codec, H: FrameHeader> Shared<C, H> {
    fn lock_link(&self) -> MutexGuard<'_, LinkState> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> ConnectionState { self.lock_link().status }

    fn next_sequence(&self) -> u32 {
        self.sequence
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next()
    }

    fn next_msg_sequence(&self) -> u32 {
        self.msg_sequence
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next()
    }

    fn ensure_driver(self: &Arc<Self>) {
        let receiver = self
            .events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(events) = receiver {
            tokio::spawn(driver::drive(Arc::downgrade(self), events));
        }
    }
}

enum ConnectStep {
    Ready,
    Join(Waiter<Result<(), ConnectError>>),
    Start(Waiter<Result<(), ConnectError>>, u64),
}

enum DisconnectStep {
    Done,
    Join(Waiter<()>),
    Start(Waiter<()>, Option<Pending<Result<(), ConnectError>>>),
}

/// Handle to one logical connection.
///
/// Cloning is cheap; every clone drives the same link.
pub struct Connection<C: Codec, H: FrameHeader> {
    shared: Arc<Shared<C, H>>,
}

impl<C: Codec, H: FrameHeader> Clone for Connection<C, H> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Codec, H: FrameHeader> Connection<C, H> {
    pub(crate) fn from_parts(
        config: ConnectionConfig,
        transport: Arc<dyn Transport>,
        router: ServiceRouter<C>,
        hooks: LifecycleHooks,
    ) -> Self {
        let (min, max) = config.sequence_bounds();
        let (events_tx, events_rx) = crate::transport::event_channel();
        Self {
            shared: Arc::new(Shared {
                config,
                transport,
                router,
                hooks,
                link: Mutex::new(LinkState::default()),
                events_tx,
                events_rx: Mutex::new(Some(events_rx)),
                sequence: Mutex::new(SequenceCounter::new(min, max)),
                msg_sequence: Mutex::new(SequenceCounter::new(min, max)),
                pending_calls: DashMap::new(),
                api_handlers: DashMap::new(),
                msg_handlers: DashMap::new(),
            }),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState { self.shared.state() }

    /// Settings this connection was built with.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig { &self.shared.config }

    /// Service router shared with inbound dispatch.
    #[must_use]
    pub fn router(&self) -> &ServiceRouter<C> { &self.shared.router }

    /// Open the link.
    ///
    /// Returns immediately if the connection is already open. Concurrent
    /// callers while a connect is in flight share its outcome; only one
    /// transport attempt is made.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::Closing`] while a disconnect is in progress,
    /// [`ConnectError::Aborted`] if `disconnect` is called before the link
    /// opens, and [`ConnectError::Start`] or [`ConnectError::Failed`] if the
    /// transport cannot open the link.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let step = {
            let mut link = self.shared.lock_link();
            match link.status {
                ConnectionState::Opened => ConnectStep::Ready,
                ConnectionState::Closing => return Err(ConnectError::Closing),
                ConnectionState::Closed | ConnectionState::Opening => {
                    match link.connecting.as_ref().map(Pending::waiter) {
                        Some(waiter) => ConnectStep::Join(waiter),
                        None => {
                            link.attempt += 1;
                            let pending = Pending::new();
                            let waiter = pending.waiter();
                            link.connecting = Some(pending);
                            link.status = ConnectionState::Opening;
                            ConnectStep::Start(waiter, link.attempt)
                        }
                    }
                }
            }
        };

        let waiter = match step {
            ConnectStep::Ready => return Ok(()),
            ConnectStep::Join(waiter) => waiter,
            ConnectStep::Start(waiter, attempt) => {
                self.start_attempt(attempt);
                waiter
            }
        };
        waiter.await.unwrap_or(Err(ConnectError::Aborted))
    }

    fn start_attempt(&self, attempt: u64) {
        let shared = &self.shared;
        shared.ensure_driver();
        let address = shared.config.address();
        tracing::info!(peer.addr = %address, attempt, "start connecting");
        let events = EventSender::new(shared.events_tx.clone(), attempt);
        if let Err(source) = shared
            .transport
            .connect(address, shared.config.protocols(), events)
        {
            tracing::warn!(peer.addr = %address, error = %source, "failed to start connecting");
            let pending = {
                let mut link = shared.lock_link();
                if link.attempt == attempt && link.status == ConnectionState::Opening {
                    link.status = ConnectionState::Closed;
                    link.connecting.take()
                } else {
                    None
                }
            };
            if let Some(pending) = pending {
                pending.resolve(Err(ConnectError::Start {
                    address: address.to_owned(),
                    source,
                }));
            }
        }
    }

    /// Close the link.
    ///
    /// A no-op when already closed. Waits for the transport to report the
    /// close, but never longer than the configured disconnect timeout; after
    /// that the connection is forced closed. A connect still in flight
    /// resolves with [`ConnectError::Aborted`].
    pub async fn disconnect(&self) {
        let step = {
            let mut link = self.shared.lock_link();
            match link.status {
                ConnectionState::Closed => DisconnectStep::Done,
                ConnectionState::Closing => link
                    .disconnecting
                    .as_ref()
                    .map_or(DisconnectStep::Done, |pending| {
                        DisconnectStep::Join(pending.waiter())
                    }),
                ConnectionState::Opening | ConnectionState::Opened => {
                    let pending = Pending::new();
                    let waiter = pending.waiter();
                    link.disconnecting = Some(pending);
                    link.status = ConnectionState::Closing;
                    DisconnectStep::Start(waiter, link.connecting.take())
                }
            }
        };

        let waiter = match step {
            DisconnectStep::Done => return,
            DisconnectStep::Join(waiter) => waiter,
            DisconnectStep::Start(waiter, connecting) => {
                if let Some(pending) = connecting {
                    pending.resolve(Err(ConnectError::Aborted));
                }
                let config = &self.shared.config;
                tracing::info!(
                    peer.addr = %config.address(),
                    code = config.close_code(),
                    "disconnecting"
                );
                self.shared
                    .transport
                    .close(config.close_code(), config.close_reason());
                waiter
            }
        };

        let limit = self.shared.config.disconnect_timeout();
        if tokio::time::timeout(limit, waiter).await.is_err() {
            self.shared.force_closed();
        }
    }

    /// Register the handler for the api `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::DuplicateApiHandler`] if `name` already
    /// has a handler.
    pub fn register_api_handler<F, Fut>(
        &self,
        name: impl Into<String>,
        f: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(crate::call::ApiCall<C, H>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), crate::handler::HandlerError>> + Send + 'static,
    {
        self.insert_api_handler(name.into(), api_handler(f))
    }

    /// Register the handler for the notification `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::DuplicateMsgHandler`] if `name` already
    /// has a handler.
    pub fn register_msg_handler<F, Fut>(
        &self,
        name: impl Into<String>,
        f: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(crate::call::MsgCall<C, H>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), crate::handler::HandlerError>> + Send + 'static,
    {
        match self.shared.msg_handlers.entry(name.into()) {
            Entry::Occupied(entry) => Err(RegistrationError::DuplicateMsgHandler(
                entry.key().clone(),
            )),
            Entry::Vacant(entry) => {
                entry.insert(msg_handler(f));
                Ok(())
            }
        }
    }

    fn insert_api_handler(
        &self,
        name: String,
        handler: ApiHandler<C, H>,
    ) -> Result<(), RegistrationError> {
        match self.shared.api_handlers.entry(name) {
            Entry::Occupied(entry) => Err(RegistrationError::DuplicateApiHandler(
                entry.key().clone(),
            )),
            Entry::Vacant(entry) => {
                entry.insert(handler);
                Ok(())
            }
        }
    }

    /// Returns `true` if the api `name` has a handler.
    #[must_use]
    pub fn has_api_handler(&self, name: &str) -> bool { self.shared.api_handlers.contains_key(name) }

    /// Returns `true` if the notification `name` has a handler.
    #[must_use]
    pub fn has_msg_handler(&self, name: &str) -> bool { self.shared.msg_handlers.contains_key(name) }

    /// Register handlers from `source` for every api in the registry.
    ///
    /// Apis that already have a handler count as implemented. Nothing here
    /// fails; apis the source cannot implement are listed in the report.
    pub fn implement_all(&self, source: &dyn HandlerSource<C, H>) -> ImplementReport {
        let mut report = ImplementReport::default();
        for service in self.shared.router.registry().services() {
            if !service.is_api() {
                continue;
            }
            let name = service.name();
            if self.has_api_handler(name) {
                report.succeed(name);
                continue;
            }
            let Some(handler) = source.api_handler(service) else {
                report.fail(name, format_args!("Api not implemented: {name}"));
                continue;
            };
            match self.insert_api_handler(name.to_owned(), handler) {
                Ok(()) => report.succeed(name),
                Err(e) => report.fail(name, e),
            }
        }
        log::info!(
            "implemented {} apis, {} missing",
            report.succeeded().len(),
            report.failed().len()
        );
        report
    }
}
