//! Builder for [`Connection`].

use std::{future::Future, sync::Arc};

use super::{Connection, ConnectionConfig, LifecycleHooks};
use crate::{
    codec::Codec,
    error::CallError,
    frame::FrameHeader,
    router::ServiceRouter,
    service::ServiceRegistry,
    transport::{TcpTransport, Transport},
};

/// Configures and builds a [`Connection`].
///
/// # Examples
///
/// ```
/// use callwire::connection::ConnectionBuilder;
///
/// let builder = ConnectionBuilder::new("127.0.0.1:9000")
///     .disconnect_timeout_ms(500)
///     .on_connection_lost(|code, reason| async move {
///         eprintln!("lost connection: {code} {reason}");
///     });
/// assert_eq!(builder.config().address(), "127.0.0.1:9000");
/// ```
pub struct ConnectionBuilder {
    config: ConnectionConfig,
    hooks: LifecycleHooks,
}

impl ConnectionBuilder {
    /// Start from default settings for a peer at `address`.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self { Self::from_config(ConnectionConfig::new(address)) }

    /// Start from a complete configuration, for example one loaded from a
    /// file.
    #[must_use]
    pub fn from_config(config: ConnectionConfig) -> Self {
        Self {
            config,
            hooks: LifecycleHooks::default(),
        }
    }

    /// Settings collected so far.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig { &self.config }

    /// Apply `f` to the settings collected so far.
    #[must_use]
    pub fn configure(mut self, f: impl FnOnce(ConnectionConfig) -> ConnectionConfig) -> Self {
        self.config = f(self.config);
        self
    }

    /// See [`ConnectionConfig::disconnect_timeout_ms`].
    #[must_use]
    pub fn disconnect_timeout_ms(self, ms: u64) -> Self {
        self.configure(|config| config.disconnect_timeout_ms(ms))
    }

    /// See [`ConnectionConfig::call_timeout_ms`].
    #[must_use]
    pub fn call_timeout_ms(self, ms: Option<u64>) -> Self {
        self.configure(|config| config.call_timeout_ms(ms))
    }

    /// Register a callback fired when an open connection closes without
    /// `disconnect` having been called.
    #[must_use]
    pub fn on_connection_lost<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(u16, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks.on_connection_lost = Some(Arc::new(move |code, reason| Box::pin(f(code, reason))));
        self
    }

    /// Register a callback fired before an outbound call or notification
    /// error is returned to the caller.
    #[must_use]
    pub fn on_error<F, Fut>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a CallError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.hooks.on_error = Some(Arc::new(move |e| Box::pin(f(e))));
        self
    }

    /// Build a connection over `transport`.
    ///
    /// The connection starts [`Closed`](super::ConnectionState::Closed);
    /// call [`Connection::connect`] to open it.
    #[must_use]
    pub fn build<C, H>(
        self,
        transport: Arc<dyn Transport>,
        registry: Arc<dyn ServiceRegistry>,
        codec: Arc<C>,
    ) -> Connection<C, H>
    where
        C: Codec,
        H: FrameHeader,
    {
        Connection::from_parts(
            self.config,
            transport,
            ServiceRouter::new(registry, codec),
            self.hooks,
        )
    }

    /// Build a connection over a [`TcpTransport`] honouring the configured
    /// maximum frame length.
    #[must_use]
    pub fn build_tcp<C, H>(
        self,
        registry: Arc<dyn ServiceRegistry>,
        codec: Arc<C>,
    ) -> Connection<C, H>
    where
        C: Codec,
        H: FrameHeader,
    {
        let transport = Arc::new(TcpTransport::new(self.config.frame_length_limit()));
        self.build(transport, registry, codec)
    }
}
