//! The duplex engine: binds an inbound and an outbound endpoint of one call, and drives a
//! [Reaction] over the inbound sequence.

use crate::call::CallShared;
use crate::endpoint::{Inbound, Outbound};
use duplex_rpc_core::error::{CallError, RpcIntErr};
use duplex_rpc_core::io::Cancellable;
use std::future::Future;
use std::sync::Arc;

/// How many messages a direction carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Multiplicity {
    /// Exactly one message then completion
    One,
    /// Zero or more messages then completion
    Many,
}

/// The four call shapes, as (request multiplicity, response multiplicity)
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[repr(u8)]
pub enum CallShape {
    Unary = 0,
    ServerStreaming = 1,
    ClientStreaming = 2,
    Bidi = 3,
}

impl CallShape {
    /// Multiplicity of the client-to-server direction
    #[inline]
    pub fn requests(self) -> Multiplicity {
        match self {
            Self::Unary | Self::ServerStreaming => Multiplicity::One,
            Self::ClientStreaming | Self::Bidi => Multiplicity::Many,
        }
    }

    /// Multiplicity of the server-to-client direction
    #[inline]
    pub fn responses(self) -> Multiplicity {
        match self {
            Self::Unary | Self::ClientStreaming => Multiplicity::One,
            Self::ServerStreaming | Self::Bidi => Multiplicity::Many,
        }
    }
}

impl TryFrom<u8> for CallShape {
    type Error = RpcIntErr;

    #[inline]
    fn try_from(v: u8) -> Result<Self, RpcIntErr> {
        match v {
            0 => Ok(Self::Unary),
            1 => Ok(Self::ServerStreaming),
            2 => Ok(Self::ClientStreaming),
            3 => Ok(Self::Bidi),
            _ => Err(RpcIntErr::Decode),
        }
    }
}

/// The per-call application logic run by the [DuplexEngine].
///
/// `on_message` is invoked once per inbound message, in arrival order, never
/// concurrently. It may send any number of messages (subject to the outbound
/// multiplicity) before returning. An error from either callback fails the call.
pub trait Reaction: Send + 'static {
    type In: Send + 'static;
    type Out: Send + 'static;

    fn on_message(
        &mut self, msg: Self::In, out: &Outbound<Self::Out>,
    ) -> impl Future<Output = Result<(), CallError>> + Send;

    /// Invoked once after the inbound completed normally, before the outbound is closed.
    #[inline]
    fn on_inbound_complete(
        &mut self, _out: &Outbound<Self::Out>,
    ) -> impl Future<Output = Result<(), CallError>> + Send {
        async { Ok(()) }
    }
}

/// Binds two endpoints under one call state machine.
pub struct DuplexEngine<R: Reaction> {
    reaction: R,
    inbound: Inbound<R::In>,
    outbound: Outbound<R::Out>,
    call: Arc<CallShared>,
}

impl<R: Reaction> DuplexEngine<R> {
    pub fn new(
        reaction: R, inbound: Inbound<R::In>, outbound: Outbound<R::Out>, call: Arc<CallShared>,
    ) -> Self {
        Self { reaction, inbound, outbound, call }
    }

    /// Run until the call is terminal, returns the outcome of the call.
    ///
    /// After normal inbound completion, runs `on_inbound_complete` then closes the outbound.
    /// Any error fails the whole call, and pending operations of both endpoints observe it.
    pub async fn run(mut self) -> Result<(), CallError> {
        let call = self.call.clone();
        loop {
            match self.inbound.next_message().await {
                Ok(Some(msg)) => {
                    let r =
                        Cancellable::new(self.reaction.on_message(msg, &self.outbound), call.failed())
                            .await;
                    if !Self::check(&call, r) {
                        break;
                    }
                }
                Ok(None) => {
                    let r = Cancellable::new(
                        self.reaction.on_inbound_complete(&self.outbound),
                        call.failed(),
                    )
                    .await;
                    if Self::check(&call, r) {
                        if let Err(e) = self.outbound.close_send().await {
                            call.fail(e);
                        }
                    }
                    break;
                }
                // The inbound failure already failed the call
                Err(_) => break,
            }
        }
        call.wait_terminal().await;
        let res = call.outcome();
        logger_debug!(call.get_logger(), "{:?} engine done: {:?}", call, res);
        res
    }

    #[inline]
    fn check(call: &CallShared, r: Result<Result<(), CallError>, ()>) -> bool {
        match r {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                call.fail(e);
                false
            }
            // failed meanwhile
            Err(()) => false,
        }
    }
}
