//! Outbound calls and notifications.

use tokio::{sync::oneshot, time::timeout};

use super::{Connection, Shared};
use crate::{
    codec::Codec,
    error::CallError,
    frame::{ConnectionTag, Frame, FrameHeader, MessageKind, MultiplexedHeader, SimpleHeader},
    metrics::{self, Direction},
};

impl<C: Codec, H: FrameHeader> Shared<C, H> {
    /// Write one frame if the connection is open.
    pub(super) async fn send_frame(&self, frame: &Frame<H>) -> Result<(), CallError> {
        if !self.state().is_open() {
            return Err(CallError::NotConnected);
        }
        self.transport
            .send(frame.encode())
            .await
            .map_err(CallError::Send)?;
        metrics::inc_frames(Direction::Outbound);
        Ok(())
    }
}

/// Frees a call's correlation slot however the call ends, including when
/// the caller drops the future.
struct SlotGuard<'a, C: Codec, H: FrameHeader> {
    shared: &'a Shared<C, H>,
    key: (u32, u32),
}

impl<C: Codec, H: FrameHeader> Drop for SlotGuard<'_, C, H> {
    fn drop(&mut self) { self.shared.pending_calls.remove(&self.key); }
}

impl<C: Codec, H: FrameHeader> Connection<C, H> {
    async fn report<T>(&self, result: Result<T, CallError>) -> Result<T, CallError> {
        if let Err(e) = &result {
            metrics::inc_errors();
            if let Some(hook) = &self.shared.hooks.on_error {
                hook(e).await;
            }
        }
        result
    }

    async fn request(
        &self,
        name: &str,
        request: &C::Value,
        header: impl FnOnce(u32, u32) -> H,
    ) -> Result<C::Value, CallError> {
        let shared = &self.shared;
        let (service_id, payload) = {
            let service = shared.router.lookup_api(name)?;
            let payload = shared.router.encode(request, service.inbound_schema())?;
            (service.id(), payload)
        };
        let sequence = shared.next_sequence();
        let key = (service_id, sequence);
        let (tx, rx) = oneshot::channel();
        if shared.pending_calls.insert(key, tx).is_some() {
            log::warn!("sequence {sequence} reused for {name} while a call was outstanding");
        }
        let _slot = SlotGuard {
            shared: &**shared,
            key,
        };

        let frame = Frame::new(header(service_id, sequence), payload);
        shared.send_frame(&frame).await?;

        let reply = match shared.config.call_timeout() {
            Some(limit) => {
                if let Ok(reply) = timeout(limit, rx).await {
                    reply
                } else {
                    log::warn!("call to {name} seq={sequence} timed out after {limit:?}");
                    return Err(CallError::Timeout);
                }
            }
            None => rx.await,
        };
        reply.map_err(|_| CallError::Disconnected)?
    }

    async fn notify(
        &self,
        name: &str,
        body: &C::Value,
        header: impl FnOnce(u32, u32) -> H,
    ) -> Result<(), CallError> {
        let shared = &self.shared;
        let (service_id, payload) = {
            let service = shared.router.lookup_msg(name)?;
            let payload = shared.router.encode(body, service.inbound_schema())?;
            (service.id(), payload)
        };
        let frame = Frame::new(header(service_id, shared.next_msg_sequence()), payload);
        shared.send_frame(&frame).await
    }
}

impl<C: Codec> Connection<C, SimpleHeader> {
    /// Call the api `name` and wait for its reply.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Remote`] if the peer answered with an error, and
    /// another [`CallError`] if the call could not be made or no reply
    /// arrived.
    pub async fn call(&self, name: &str, request: &C::Value) -> Result<C::Value, CallError> {
        let result = self.request(name, request, SimpleHeader::new).await;
        self.report(result).await
    }

    /// Send the notification `name`. Only the local write is awaited.
    ///
    /// # Errors
    ///
    /// Returns a [`CallError`] if the notification could not be encoded or
    /// written.
    pub async fn send_msg(&self, name: &str, body: &C::Value) -> Result<(), CallError> {
        let result = self.notify(name, body, SimpleHeader::new).await;
        self.report(result).await
    }
}

impl<C: Codec> Connection<C, MultiplexedHeader> {
    /// Call the api `name` on behalf of the downstream peer `tag`.
    ///
    /// # Errors
    ///
    /// As for the simple-header `call`.
    pub async fn call(
        &self,
        tag: ConnectionTag,
        kind: MessageKind,
        name: &str,
        request: &C::Value,
    ) -> Result<C::Value, CallError> {
        let result = self
            .request(name, request, |service, sequence| {
                MultiplexedHeader::new(tag, kind, service, sequence)
            })
            .await;
        self.report(result).await
    }

    /// Send the notification `name` to the downstream peer `tag`.
    ///
    /// # Errors
    ///
    /// Returns a [`CallError`] if the notification could not be encoded or
    /// written.
    pub async fn send_msg(
        &self,
        tag: ConnectionTag,
        kind: MessageKind,
        name: &str,
        body: &C::Value,
    ) -> Result<(), CallError> {
        let result = self
            .notify(name, body, |service, sequence| {
                MultiplexedHeader::new(tag, kind, service, sequence)
            })
            .await;
        self.report(result).await
    }
}
