//! Request/response call with an at-most-once reply slot.

use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use crate::{
    codec::{ApiReturn, Codec},
    connection::Shared,
    error::{CallError, RpcError},
    frame::FrameHeader,
    service::ServiceDescriptor,
};

/// What happened to a reply handed to [`ApiCall::succeed`] or
/// [`ApiCall::fail`].
#[derive(Debug)]
pub enum ReplyOutcome {
    /// The reply frame was written.
    Sent,
    /// The reply was recorded but not written because the connection is not
    /// open.
    Suppressed,
    /// An earlier reply was already recorded; nothing changed.
    AlreadyReplied,
    /// The reply was recorded but encoding or writing it failed. It is not
    /// retried.
    Failed(CallError),
}

impl ReplyOutcome {
    /// Returns `true` if a reply frame reached the transport.
    #[must_use]
    pub const fn is_sent(&self) -> bool { matches!(self, Self::Sent) }
}

struct Inner<C: Codec, H: FrameHeader> {
    header: H,
    service: ServiceDescriptor,
    request: C::Value,
    reply: OnceLock<ApiReturn<C::Value>>,
    link: Arc<Shared<C, H>>,
}

/// An inbound api request awaiting exactly one reply.
///
/// Clones share the same reply slot. The first of [`succeed`](Self::succeed)
/// or [`fail`](Self::fail) wins; later attempts return
/// [`ReplyOutcome::AlreadyReplied`] and write nothing.
pub struct ApiCall<C: Codec, H: FrameHeader> {
    inner: Arc<Inner<C, H>>,
}

impl<C: Codec, H: FrameHeader> Clone for ApiCall<C, H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Codec, H: FrameHeader> fmt::Debug for ApiCall<C, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCall")
            .field("header", &self.inner.header)
            .field("service", &self.inner.service.name())
            .field("replied", &self.is_replied())
            .finish_non_exhaustive()
    }
}

impl<C: Codec, H: FrameHeader> ApiCall<C, H> {
    pub(crate) fn new(
        link: Arc<Shared<C, H>>,
        header: H,
        service: ServiceDescriptor,
        request: C::Value,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                header,
                service,
                request,
                reply: OnceLock::new(),
                link,
            }),
        }
    }

    /// Header of the request frame.
    #[must_use]
    pub fn header(&self) -> &H { &self.inner.header }

    /// The addressed service.
    #[must_use]
    pub fn service(&self) -> &ServiceDescriptor { &self.inner.service }

    /// The decoded request body.
    #[must_use]
    pub fn request(&self) -> &C::Value { &self.inner.request }

    /// The recorded reply, once one has been set.
    #[must_use]
    pub fn reply(&self) -> Option<&ApiReturn<C::Value>> { self.inner.reply.get() }

    /// Returns `true` once a reply has been recorded.
    #[must_use]
    pub fn is_replied(&self) -> bool { self.inner.reply.get().is_some() }

    /// Answer with `response`.
    pub async fn succeed(&self, response: C::Value) -> ReplyOutcome {
        self.settle(ApiReturn::Success(response)).await
    }

    /// Answer with `error`.
    pub async fn fail(&self, error: RpcError) -> ReplyOutcome {
        self.settle(ApiReturn::Failure(error)).await
    }

    async fn settle(&self, ret: ApiReturn<C::Value>) -> ReplyOutcome {
        if self.inner.reply.set(ret).is_err() {
            log::debug!(
                "ignoring second reply to {} seq={}",
                self.inner.service.name(),
                self.inner.header.sequence_id()
            );
            return ReplyOutcome::AlreadyReplied;
        }
        let Some(ret) = self.inner.reply.get() else {
            return ReplyOutcome::AlreadyReplied;
        };
        self.inner
            .link
            .send_reply(&self.inner.header, &self.inner.service, ret)
            .await
    }
}
