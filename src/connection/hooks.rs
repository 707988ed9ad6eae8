//! Connection lifecycle hooks.
//!
//! Hooks observe a connection without taking part in its state machine.
//! They are awaited in place, so a slow hook delays the event that fired it.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::CallError;

/// Handler invoked when an open connection closes without `disconnect`
/// having been called.
///
/// Receives the close status code and reason reported by the transport. The
/// connection does not reconnect on its own; this hook is where a caller
/// would schedule that.
pub type ConnectionLostHandler = Arc<dyn Fn(u16, String) -> BoxFuture<'static, ()> + Send + Sync>;

/// Handler invoked before an outbound `call` or `send_msg` error is
/// returned to the caller.
pub type CallErrorHandler = Arc<dyn for<'a> Fn(&'a CallError) -> BoxFuture<'a, ()> + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct LifecycleHooks {
    pub(crate) on_connection_lost: Option<ConnectionLostHandler>,
    pub(crate) on_error: Option<CallErrorHandler>,
}
