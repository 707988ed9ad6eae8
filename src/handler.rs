//! Handler types and bulk registration.
//!
//! Handlers are registered on a [`Connection`](crate::connection::Connection)
//! by service name. Each name has at most one handler; registering a second
//! one fails instead of replacing the first.
//!
//! Bulk registration walks the service registry and asks a
//! [`HandlerSource`] for each api. [`HandlerTable`] is the plain
//! name-to-handler source most applications build at startup.

use std::{collections::HashMap, error::Error, fmt, future::Future, sync::Arc};

use futures::future::BoxFuture;

use crate::{
    call::{ApiCall, MsgCall},
    codec::Codec,
    frame::FrameHeader,
    service::ServiceDescriptor,
};

/// Error returned by a handler.
///
/// An api handler failing with a boxed [`RpcError`](crate::error::RpcError)
/// has that error sent as the reply. Any other error is logged and answered
/// with a generic internal server error.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// Boxed api handler.
pub type ApiHandler<C, H> =
    Arc<dyn Fn(ApiCall<C, H>) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

/// Boxed notification handler.
pub type MsgHandler<C, H> =
    Arc<dyn Fn(MsgCall<C, H>) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

/// Box an async closure as an [`ApiHandler`].
pub fn api_handler<C, H, F, Fut>(f: F) -> ApiHandler<C, H>
where
    C: Codec,
    H: FrameHeader,
    F: Fn(ApiCall<C, H>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(move |call| Box::pin(f(call)))
}

/// Box an async closure as a [`MsgHandler`].
pub fn msg_handler<C, H, F, Fut>(f: F) -> MsgHandler<C, H>
where
    C: Codec,
    H: FrameHeader,
    F: Fn(MsgCall<C, H>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(move |call| Box::pin(f(call)))
}

/// Supplies api handlers for bulk registration.
pub trait HandlerSource<C: Codec, H: FrameHeader> {
    /// Return the handler for `service`, or `None` if this source does not
    /// implement it.
    fn api_handler(&self, service: &ServiceDescriptor) -> Option<ApiHandler<C, H>>;
}

/// Explicit table of api handlers keyed by service name.
pub struct HandlerTable<C: Codec, H: FrameHeader> {
    apis: HashMap<String, ApiHandler<C, H>>,
}

impl<C: Codec, H: FrameHeader> HandlerTable<C, H> {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            apis: HashMap::new(),
        }
    }

    /// Add a handler for the api `name`, replacing any earlier entry.
    #[must_use]
    pub fn with_api<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ApiCall<C, H>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.insert(name, api_handler(f));
        self
    }

    /// Insert an already boxed handler. Returns the entry it replaced.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        handler: ApiHandler<C, H>,
    ) -> Option<ApiHandler<C, H>> {
        self.apis.insert(name.into(), handler)
    }

    /// Number of handlers in the table.
    #[must_use]
    pub fn len(&self) -> usize { self.apis.len() }

    /// Returns `true` if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.apis.is_empty() }
}

impl<C: Codec, H: FrameHeader> Default for HandlerTable<C, H> {
    fn default() -> Self { Self::new() }
}

impl<C: Codec, H: FrameHeader> HandlerSource<C, H> for HandlerTable<C, H> {
    fn api_handler(&self, service: &ServiceDescriptor) -> Option<ApiHandler<C, H>> {
        self.apis.get(service.name()).cloned()
    }
}

/// One api a bulk registration could not implement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImplementFailure {
    /// Service name.
    pub service: String,
    /// Why it was not implemented.
    pub reason: String,
}

/// Result of [`Connection::implement_all`](crate::connection::Connection::implement_all).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImplementReport {
    succeeded: Vec<String>,
    failed: Vec<ImplementFailure>,
}

impl ImplementReport {
    pub(crate) fn succeed(&mut self, service: &str) { self.succeeded.push(service.to_owned()); }

    pub(crate) fn fail(&mut self, service: &str, reason: impl fmt::Display) {
        self.failed.push(ImplementFailure {
            service: service.to_owned(),
            reason: reason.to_string(),
        });
    }

    /// Apis that now have a handler.
    #[must_use]
    pub fn succeeded(&self) -> &[String] { &self.succeeded }

    /// Apis left without a handler.
    #[must_use]
    pub fn failed(&self) -> &[ImplementFailure] { &self.failed }

    /// Returns `true` if every api has a handler.
    #[must_use]
    pub fn is_complete(&self) -> bool { self.failed.is_empty() }
}
