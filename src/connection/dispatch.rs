//! Inbound frame dispatch.
//!
//! Each message is parsed into a frame, then either completes one of this
//! connection's outstanding calls or is routed to a handler. A frame whose
//! key matches an outstanding call completes it only if its payload decodes
//! as a reply. Frames that cannot be parsed are dropped. Only api requests
//! are ever answered.

use std::{panic::AssertUnwindSafe, sync::Arc};

use bytes::Bytes;
use futures::FutureExt;
use log::{debug, error, warn};

use super::Shared;
use crate::{
    call::{ApiCall, MsgCall, ReplyOutcome},
    codec::{ApiReturn, Codec},
    error::{CallError, ProtocolError, RpcError},
    frame::{Frame, FrameHeader},
    metrics::{self, Direction},
    panic::panic_message,
    router::Inbound,
    service::ServiceDescriptor,
};

impl<C: Codec, H: FrameHeader> Shared<C, H> {
    pub(super) async fn dispatch(self: &Arc<Self>, bytes: Bytes) {
        metrics::inc_frames(Direction::Inbound);
        let frame = match Frame::<H>::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("dropping frame: {e}");
                metrics::inc_dropped();
                return;
            }
        };

        let header = frame.header().clone();
        let key = (header.service_id(), header.sequence_id());
        let reply_error = if self.pending_calls.contains_key(&key) {
            match self.decode_reply(&frame) {
                Ok(ret) => {
                    self.complete_call(key, ret.into_result().map_err(CallError::Remote));
                    return;
                }
                Err(e) => Some(e),
            }
        } else {
            None
        };

        // The peer's counters also start at 1, so a frame sharing a call's key
        // may be its own request. One that is neither still settles the call.
        match (self.router.parse(frame), reply_error) {
            (
                Ok(Inbound::Api {
                    header,
                    service,
                    request,
                }),
                _,
            ) => {
                let call = ApiCall::new(Arc::clone(self), header, service, request);
                self.dispatch_api(call).await;
            }
            (
                Ok(Inbound::Msg {
                    header,
                    service,
                    body,
                }),
                _,
            ) => self.dispatch_msg(MsgCall::new(header, service, body)).await,
            (Err(_), Some(e)) => {
                warn!(
                    "undecodable reply for service {} seq={}: {e}",
                    header.service_id(),
                    header.sequence_id()
                );
                self.complete_call(key, Err(e));
            }
            (Err(ProtocolError::Decode { service, source }), None) => {
                warn!(
                    "dropping frame for {service} seq={}: {source}",
                    header.sequence_id()
                );
                metrics::inc_dropped();
                if self.config.replies_on_decode_error() {
                    self.reject_undecodable(&header).await;
                }
            }
            (Err(e), None) => {
                warn!("dropping frame seq={}: {e}", header.sequence_id());
                metrics::inc_dropped();
            }
        }
    }

    fn decode_reply(&self, frame: &Frame<H>) -> Result<ApiReturn<C::Value>, CallError> {
        let service_id = frame.header().service_id();
        let service = self
            .router
            .resolve(service_id)
            .ok_or_else(|| CallError::UnknownService(service_id.to_string()))?;
        Ok(self.router.decode_reply(service, frame.payload())?)
    }

    fn complete_call(&self, key: (u32, u32), result: Result<C::Value, CallError>) {
        let Some((_, waiter)) = self.pending_calls.remove(&key) else {
            return;
        };
        if waiter.send(result).is_err() {
            debug!(
                "reply for service {} seq={} arrived after the caller gave up",
                key.0, key.1
            );
        }
    }

    async fn reject_undecodable(&self, header: &H) {
        let Some(service) = self.router.resolve(header.service_id()) else {
            return;
        };
        if !service.is_api() {
            return;
        }
        let service = service.clone();
        let ret = ApiReturn::Failure(RpcError::bad_request(service.name()));
        self.send_reply(header, &service, &ret).await;
    }

    async fn dispatch_api(&self, call: ApiCall<C, H>) {
        let name = call.service().name().to_owned();
        let handler = self
            .api_handlers
            .get(&name)
            .map(|entry| Arc::clone(entry.value()));
        let Some(handler) = handler else {
            warn!("no handler registered for api {name}");
            call.fail(RpcError::unhandled(&name)).await;
            return;
        };

        match AssertUnwindSafe(handler(call.clone())).catch_unwind().await {
            Ok(Ok(())) => {
                if !call.is_replied() {
                    debug!("api handler for {name} returned without replying");
                }
            }
            Ok(Err(e)) => {
                metrics::inc_handler_errors();
                let reply = match e.downcast::<RpcError>() {
                    Ok(rpc) => *rpc,
                    Err(other) => {
                        error!("api handler for {name} failed: {other}");
                        RpcError::internal()
                    }
                };
                call.fail(reply).await;
            }
            Err(panic) => {
                metrics::inc_handler_errors();
                error!(
                    "api handler for {name} panicked: panic={}",
                    panic_message(&*panic)
                );
                call.fail(RpcError::internal()).await;
            }
        }
    }

    async fn dispatch_msg(&self, call: MsgCall<C, H>) {
        let name = call.service().name().to_owned();
        let handler = self
            .msg_handlers
            .get(&name)
            .map(|entry| Arc::clone(entry.value()));
        let Some(handler) = handler else {
            debug!("no handler registered for msg {name}");
            return;
        };

        match AssertUnwindSafe(handler(call)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                metrics::inc_handler_errors();
                error!("msg handler for {name} failed: {e}");
            }
            Err(panic) => {
                metrics::inc_handler_errors();
                error!(
                    "msg handler for {name} panicked: panic={}",
                    panic_message(&*panic)
                );
            }
        }
    }

    /// Encode and write the reply to an api request.
    ///
    /// Nothing is written while the connection is not open; the reply is
    /// reported as suppressed instead.
    pub(crate) async fn send_reply(
        &self,
        header: &H,
        service: &ServiceDescriptor,
        ret: &ApiReturn<C::Value>,
    ) -> ReplyOutcome {
        let status = self.state();
        if !status.is_open() {
            debug!(
                "suppressing reply to {} seq={} while {status}",
                service.name(),
                header.sequence_id()
            );
            return ReplyOutcome::Suppressed;
        }
        let payload = match self.router.encode_return(service, ret) {
            Ok(payload) => payload,
            Err(e) => {
                error!("failed to encode reply to {}: {e}", service.name());
                metrics::inc_errors();
                return ReplyOutcome::Failed(e.into());
            }
        };
        let frame = Frame::new(header.reply(self.config.reply_kind()), payload);
        match self.send_frame(&frame).await {
            Ok(()) => ReplyOutcome::Sent,
            Err(e) => {
                warn!(
                    "failed to send reply to {} seq={}: {e}",
                    service.name(),
                    header.sequence_id()
                );
                ReplyOutcome::Failed(e)
            }
        }
    }
}
