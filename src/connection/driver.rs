//! Per-connection task consuming transport events in order.

use std::sync::{Arc, Weak};

use super::{ConnectionState, Shared};
use crate::{
    codec::Codec,
    error::ConnectError,
    frame::FrameHeader,
    metrics,
    transport::{CLOSE_ABNORMAL, CLOSE_NO_STATUS, EventReceiver, TransportEvent},
};

const FORCED_CLOSE_REASON: &str = "connection closed, but no close event was received";

/// How a close event changed the connection.
#[derive(Debug, PartialEq, Eq)]
enum CloseOutcome {
    /// Already closed; nothing changed.
    Ignored,
    /// A connect attempt failed.
    ConnectFailed,
    /// A requested disconnect completed.
    Disconnected,
    /// The link went away unprompted.
    Lost,
}

pub(super) async fn drive<C: Codec, H: FrameHeader>(
    link: Weak<Shared<C, H>>,
    mut events: EventReceiver,
) {
    while let Some((attempt, event)) = events.recv().await {
        let Some(shared) = link.upgrade() else { break };
        shared.handle_event(attempt, event).await;
    }
    log::debug!("connection driver stopped");
}

impl<C: Codec, H: FrameHeader> Shared<C, H> {
    async fn handle_event(self: &Arc<Self>, attempt: u64, event: TransportEvent) {
        let current = self.lock_link().attempt;
        if attempt != current {
            log::debug!("discarding event from stale transport attempt {attempt} (current {current})");
            return;
        }
        match event {
            TransportEvent::Opened => self.on_opened(),
            TransportEvent::Closed { code, reason } => self.on_closed(code, reason).await,
            TransportEvent::Error(error) => {
                tracing::warn!(peer.addr = %self.config.address(), error = %error, "transport error");
                self.on_closed(CLOSE_ABNORMAL, error.to_string()).await;
            }
            TransportEvent::Received(bytes) => {
                let status = self.state();
                if status.is_open() {
                    self.dispatch(bytes).await;
                } else {
                    log::debug!("dropping {} byte message received while {status}", bytes.len());
                    metrics::inc_dropped();
                }
            }
        }
    }

    fn on_opened(&self) {
        let pending = {
            let mut link = self.lock_link();
            if link.status != ConnectionState::Opening {
                log::debug!("ignoring open event while {}", link.status);
                return;
            }
            link.status = ConnectionState::Opened;
            link.counted = true;
            link.connecting.take()
        };
        metrics::inc_connections();
        tracing::info!(peer.addr = %self.config.address(), "connected");
        if let Some(pending) = pending {
            pending.resolve(Ok(()));
        }
    }

    async fn on_closed(&self, code: u16, reason: String) {
        if self.close_link(code, &reason, false) != CloseOutcome::Lost {
            return;
        }
        if let Some(hook) = &self.hooks.on_connection_lost {
            hook(code, reason).await;
        }
    }

    /// Close after `disconnect` waited too long for the transport.
    pub(super) fn force_closed(&self) {
        tracing::warn!(
            peer.addr = %self.config.address(),
            timeout = ?self.config.disconnect_timeout(),
            "{FORCED_CLOSE_REASON}"
        );
        self.close_link(CLOSE_NO_STATUS, FORCED_CLOSE_REASON, true);
    }

    fn close_link(&self, code: u16, reason: &str, forced: bool) -> CloseOutcome {
        let (previous, connecting, disconnecting, counted) = {
            let mut link = self.lock_link();
            if forced && link.status != ConnectionState::Closing {
                return CloseOutcome::Ignored;
            }
            if link.status == ConnectionState::Closed {
                return CloseOutcome::Ignored;
            }
            if forced {
                // Late events from the abandoned link must not touch the
                // next attempt.
                link.attempt += 1;
            }
            let previous = std::mem::replace(&mut link.status, ConnectionState::Closed);
            let counted = std::mem::take(&mut link.counted);
            (
                previous,
                link.connecting.take(),
                link.disconnecting.take(),
                counted,
            )
        };

        if counted {
            metrics::dec_connections();
        }
        let abandoned = self.pending_calls.len();
        self.pending_calls.clear();
        if abandoned > 0 {
            log::debug!("{abandoned} outstanding calls failed by close");
        }

        if let Some(pending) = connecting {
            tracing::warn!(peer.addr = %self.config.address(), code, reason, "failed to connect");
            pending.resolve(Err(ConnectError::Failed {
                address: self.config.address().to_owned(),
            }));
            return CloseOutcome::ConnectFailed;
        }
        if let Some(pending) = disconnecting {
            tracing::info!(peer.addr = %self.config.address(), code, reason, "disconnected");
            pending.resolve(());
            return CloseOutcome::Disconnected;
        }
        tracing::warn!(
            peer.addr = %self.config.address(),
            code,
            reason,
            %previous,
            "lost connection"
        );
        CloseOutcome::Lost
    }
}
