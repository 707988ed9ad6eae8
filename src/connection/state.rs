//! Connection lifecycle state.

use std::fmt;

use super::pending::Pending;
use crate::error::ConnectError;

/// Lifecycle of a connection.
///
/// `Closed -> Opening -> Opened -> Closing -> Closed`. Failed or aborted
/// attempts go straight from `Opening` back to `Closed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No link.
    #[default]
    Closed,
    /// A connect attempt is in flight.
    Opening,
    /// Frames flow in both directions.
    Opened,
    /// A disconnect is in flight.
    Closing,
}

impl ConnectionState {
    /// Returns `true` when frames may be sent and dispatched.
    #[must_use]
    pub const fn is_open(self) -> bool { matches!(self, Self::Opened) }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Opened => "opened",
            Self::Closing => "closing",
        })
    }
}

/// Mutable link bookkeeping guarded by the connection's mutex.
#[derive(Default)]
pub(crate) struct LinkState {
    pub(crate) status: ConnectionState,
    /// Identifies the current transport attempt; events from older
    /// attempts are discarded.
    pub(crate) attempt: u64,
    /// Set while the open-connections gauge counts this link.
    pub(crate) counted: bool,
    pub(crate) connecting: Option<Pending<Result<(), ConnectError>>>,
    pub(crate) disconnecting: Option<Pending<()>>,
}
