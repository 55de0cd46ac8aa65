use crate::call::{CallPhase, CallShared};
use crate::endpoint::{Inbound, Outbound};
use duplex_rpc_core::error::CallError;
use std::fmt;
use std::sync::Arc;

/// The client side of one open call: the request outbound and the response inbound.
///
/// Sending and receiving may interleave freely. Use [split](Self::split) to move the two
/// halves into separate coroutines. Dropping an unfinished call cancels it.
pub struct ClientCall<Req, Resp> {
    outbound: Outbound<Req>,
    inbound: Inbound<Resp>,
    call: Arc<CallShared>,
}

impl<Req, Resp> fmt::Debug for ClientCall<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.call, f)
    }
}

impl<Req: Send + 'static, Resp: Send + 'static> ClientCall<Req, Resp> {
    pub(crate) fn new(outbound: Outbound<Req>, inbound: Inbound<Resp>, call: Arc<CallShared>) -> Self {
        Self { outbound, inbound, call }
    }

    #[inline]
    pub async fn send(&self, msg: Req) -> Result<(), CallError> {
        self.outbound.send(msg).await
    }

    #[inline]
    pub async fn close_send(&self) -> Result<(), CallError> {
        self.outbound.close_send().await
    }

    #[inline]
    pub async fn next_message(&mut self) -> Result<Option<Resp>, CallError> {
        self.inbound.next_message().await
    }

    /// Fail the call with `Cancelled`, the server is notified
    #[inline]
    pub fn cancel(&self) {
        self.call.fail(CallError::Cancelled);
    }

    #[inline]
    pub fn phase(&self) -> CallPhase {
        self.call.phase()
    }

    pub fn split(self) -> (Outbound<Req>, Inbound<Resp>) {
        (self.outbound, self.inbound)
    }

    /// Close the request direction, drain the remaining responses and wait for the outcome
    /// of the call.
    pub async fn finish(mut self) -> Result<Vec<Resp>, CallError> {
        if let Err(e) = self.outbound.close_send().await {
            logger_trace!(self.call.get_logger(), "{:?} finish: {}", self.call, e);
        }
        let mut rest = Vec::new();
        while let Ok(Some(msg)) = self.inbound.next_message().await {
            rest.push(msg);
        }
        self.call.wait_terminal().await;
        self.call.outcome().map(|_| rest)
    }
}
