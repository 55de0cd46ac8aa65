//! Stream endpoints, one per direction per call.
//!
//! An endpoint has two sides connected by a bounded channel of [STREAM_WINDOW] items:
//!
//! - the application side: [Outbound] (`send`, `close_send`) and [Inbound]
//!   (`next_message`), typed and encoding / decoding with the codec of the call.
//! - the transport side: [OutboundDrain] consumed by the frame writer, and [InboundFeed]
//!   filled by the frame reader, both carrying encoded payloads.
//!
//! Every wait on either side is cancelled by the failure of the call.

use crate::call::{CallShared, Direction, EndpointState};
use crate::engine::Multiplicity;
use crossfire::{AsyncRx, MAsyncRx, MAsyncTx};
use duplex_rpc_core::error::{CallError, RpcIntErr};
use duplex_rpc_core::{Codec, io::Cancellable};
use futures::stream::Stream;
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use std::sync::Arc;

/// Capacity of the queue between the application side and the transport side of an
/// endpoint. `send()` suspends when it is full.
pub const STREAM_WINDOW: usize = 64;

/// Item queued by [Outbound] for the frame writer
#[derive(Debug)]
pub enum OutItem {
    Msg(Vec<u8>),
    Close,
}

/// Item pushed by the frame reader for [Inbound]
#[derive(Debug)]
pub enum InItem {
    Msg(Vec<u8>),
    Close,
}

type EncodeFn<T> = Box<dyn Fn(&T) -> Result<Vec<u8>, ()> + Send + Sync>;
type DecodeFn<T> = Box<dyn Fn(&[u8]) -> Result<T, ()> + Send + Sync>;

#[inline]
fn terminal_error(call: &CallShared, dir: Direction) -> CallError {
    match call.error() {
        Some(e) => e,
        None => CallError::invalid_state(format!("{} endpoint errored", dir)),
    }
}

/// Untyped application side of the outbound endpoint
pub struct RawOutbound {
    tx: MAsyncTx<OutItem>,
    call: Arc<CallShared>,
}

/// Untyped application side of the inbound endpoint
pub struct RawInbound {
    rx: MAsyncRx<InItem>,
    call: Arc<CallShared>,
}

pub fn outbound_channel(call: &Arc<CallShared>) -> (RawOutbound, OutboundDrain) {
    let (tx, rx) = crossfire::mpsc::bounded_async(STREAM_WINDOW);
    (RawOutbound { tx, call: call.clone() }, OutboundDrain { rx, call: call.clone() })
}

/// The receiver is mpmc for Sync, a [crate::client::ClientCall] is borrowed across awaits.
pub fn inbound_channel(call: &Arc<CallShared>) -> (InboundFeed, RawInbound) {
    let (tx, rx) = crossfire::mpmc::bounded_async(STREAM_WINDOW);
    (InboundFeed { tx, call: call.clone() }, RawInbound { rx, call: call.clone() })
}

/// The outbound handle: "send next message" and "signal send-side completion".
///
/// Messages are transmitted in `send()` order, and `close_send()` is queued behind every
/// message sent before it. Dropping the handle while still open cancels the call.
pub struct Outbound<T> {
    tx: MAsyncTx<OutItem>,
    call: Arc<CallShared>,
    encode: EncodeFn<T>,
    mult: Multiplicity,
    /// Count of sent messages, the lock serializes send against close_send
    sent: futures::lock::Mutex<usize>,
}

impl<T: Serialize + Send + 'static> Outbound<T> {
    pub fn new<C: Codec>(raw: RawOutbound, codec: Arc<C>, mult: Multiplicity) -> Self {
        Self {
            tx: raw.tx,
            call: raw.call,
            encode: Box::new(move |msg: &T| codec.encode(msg)),
            mult,
            sent: futures::lock::Mutex::new(0),
        }
    }
}

impl<T> Outbound<T> {
    #[inline]
    pub fn state(&self) -> EndpointState {
        self.call.endpoint_state(Direction::Outbound)
    }

    /// Enqueue the next message.
    ///
    /// Fails with InvalidState if the endpoint is not Open, or on a second message of a
    /// single-message direction. Suspends while the window is full.
    pub async fn send(&self, msg: T) -> Result<(), CallError> {
        let mut sent = self.sent.lock().await;
        let state = self.state();
        if state != EndpointState::Open {
            return Err(CallError::invalid_state(format!("send on {} outbound", state)));
        }
        if self.mult == Multiplicity::One && *sent >= 1 {
            return Err(CallError::invalid_state("second message on a single-message stream"));
        }
        let buf = match (self.encode)(&msg) {
            Ok(buf) => buf,
            Err(()) => {
                let e = CallError::Transport(RpcIntErr::Encode);
                self.call.fail(e.clone());
                return Err(e);
            }
        };
        self.enqueue(OutItem::Msg(buf)).await?;
        *sent += 1;
        Ok(())
    }

    /// Open -> HalfClosed exactly once.
    ///
    /// No-op when already HalfClosed or Closed, InvalidState when Errored. Closing a
    /// single-message direction before its message fails the call.
    pub async fn close_send(&self) -> Result<(), CallError> {
        let sent = self.sent.lock().await;
        match self.state() {
            EndpointState::HalfClosed | EndpointState::Closed => return Ok(()),
            EndpointState::Errored => {
                return Err(CallError::invalid_state("close_send on errored outbound"));
            }
            EndpointState::Open => {}
        }
        if self.mult == Multiplicity::One && *sent == 0 {
            let e = CallError::invalid_state("closed a single-message stream without message");
            self.call.fail(e.clone());
            return Err(e);
        }
        if self.call.half_close(Direction::Outbound)? {
            self.enqueue(OutItem::Close).await?;
        }
        Ok(())
    }

    /// Fail the call from the outbound side. Idempotent.
    #[inline]
    pub fn fail(&self, err: CallError) {
        self.call.fail(err);
    }

    async fn enqueue(&self, item: OutItem) -> Result<(), CallError> {
        match Cancellable::new(self.tx.send(item), self.call.failed()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => {
                // The frame writer is gone
                self.call.fail(CallError::Transport(RpcIntErr::Closed));
                Err(terminal_error(&self.call, Direction::Outbound))
            }
            Err(()) => Err(terminal_error(&self.call, Direction::Outbound)),
        }
    }
}

impl<T> Drop for Outbound<T> {
    fn drop(&mut self) {
        if self.state() == EndpointState::Open {
            self.call.fail(CallError::Cancelled);
        }
    }
}

impl<T> fmt::Debug for Outbound<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} outbound", self.call)
    }
}

/// The inbound handle: a lazy, finite sequence of messages terminated by completion or
/// error, consumed front to back.
///
/// Dropping the handle before completion cancels the call.
pub struct Inbound<T> {
    rx: MAsyncRx<InItem>,
    call: Arc<CallShared>,
    decode: DecodeFn<T>,
    mult: Multiplicity,
    received: usize,
}

impl<T: DeserializeOwned + Send + 'static> Inbound<T> {
    pub fn new<C: Codec>(raw: RawInbound, codec: Arc<C>, mult: Multiplicity) -> Self {
        Self {
            rx: raw.rx,
            call: raw.call,
            decode: Box::new(move |buf: &[u8]| codec.decode::<T>(buf)),
            mult,
            received: 0,
        }
    }
}

impl<T: Send + 'static> Inbound<T> {
    #[inline]
    pub fn state(&self) -> EndpointState {
        self.call.endpoint_state(Direction::Inbound)
    }

    /// Ok(None) on completion, and on every call after it.
    pub async fn next_message(&mut self) -> Result<Option<T>, CallError> {
        match self.state() {
            EndpointState::Closed => return Ok(None),
            EndpointState::Errored => return Err(terminal_error(&self.call, Direction::Inbound)),
            _ => {}
        }
        let item = match Cancellable::new(self.rx.recv(), self.call.failed()).await {
            Ok(Ok(item)) => item,
            Ok(Err(_)) => {
                // The frame reader is gone without completion
                self.call.fail(CallError::Transport(RpcIntErr::Closed));
                return Err(terminal_error(&self.call, Direction::Inbound));
            }
            Err(()) => return Err(terminal_error(&self.call, Direction::Inbound)),
        };
        if let Some(e) = self.call.error() {
            return Err(e);
        }
        match item {
            InItem::Msg(buf) => {
                self.received += 1;
                if self.mult == Multiplicity::One && self.received > 1 {
                    let e = CallError::invalid_state("second message on a single-message stream");
                    self.call.fail(e.clone());
                    return Err(e);
                }
                match (self.decode)(&buf) {
                    Ok(msg) => Ok(Some(msg)),
                    Err(()) => {
                        let e = CallError::MalformedMessage(format!(
                            "cannot decode message #{} ({} bytes)",
                            self.received,
                            buf.len()
                        ));
                        self.call.fail(e.clone());
                        Err(e)
                    }
                }
            }
            InItem::Close => {
                if self.mult == Multiplicity::One && self.received == 0 {
                    let e = CallError::invalid_state("single-message stream completed empty");
                    self.call.fail(e.clone());
                    return Err(e);
                }
                self.call.finish(Direction::Inbound)?;
                Ok(None)
            }
        }
    }

    /// Fail the call from the inbound side, waking a pending `next_message()`. Idempotent.
    #[inline]
    pub fn fail(&self, err: CallError) {
        self.call.fail(err);
    }

    /// Adapt into a `Stream`, which ends after completion or after yielding the error
    pub fn into_stream(self) -> impl Stream<Item = Result<T, CallError>> + Send {
        futures::stream::unfold(Some(self), |inbound| async move {
            let mut inbound = inbound?;
            match inbound.next_message().await {
                Ok(Some(msg)) => Some((Ok(msg), Some(inbound))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

impl<T> Drop for Inbound<T> {
    fn drop(&mut self) {
        match self.call.endpoint_state(Direction::Inbound) {
            EndpointState::Open | EndpointState::HalfClosed => {
                self.call.fail(CallError::Cancelled);
            }
            _ => {}
        }
    }
}

impl<T> fmt::Debug for Inbound<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} inbound", self.call)
    }
}

/// Transport side of the outbound endpoint, consumed by the frame writer
pub struct OutboundDrain {
    rx: AsyncRx<OutItem>,
    call: Arc<CallShared>,
}

impl OutboundDrain {
    #[inline(always)]
    pub fn call(&self) -> &Arc<CallShared> {
        &self.call
    }

    /// The next queued item, None once the call failed.
    pub async fn next(&mut self) -> Option<OutItem> {
        match Cancellable::new(self.rx.recv(), self.call.failed()).await {
            Ok(Ok(item)) => {
                if self.call.error().is_some() {
                    return None;
                }
                Some(item)
            }
            Ok(Err(_)) => {
                if self.call.endpoint_state(Direction::Outbound) == EndpointState::Open {
                    self.call.fail(CallError::Cancelled);
                }
                None
            }
            Err(()) => None,
        }
    }

    /// Non-blocking version of [next](Self::next) for batching
    #[inline]
    pub fn try_next(&mut self) -> Option<OutItem> {
        if self.call.error().is_some() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// The close frame reached the transport, HalfClosed -> Closed
    #[inline]
    pub fn closed(&self) {
        if let Err(e) = self.call.finish(Direction::Outbound) {
            logger_trace!(self.call.get_logger(), "{:?} outbound finish: {}", self.call, e);
        }
    }
}

/// Transport side of the inbound endpoint, filled by the frame reader
pub struct InboundFeed {
    tx: MAsyncTx<InItem>,
    call: Arc<CallShared>,
}

impl InboundFeed {
    #[inline(always)]
    pub fn call(&self) -> &Arc<CallShared> {
        &self.call
    }

    /// The peer already closed its direction
    #[inline]
    pub fn peer_closed(&self) -> bool {
        self.call.endpoint_state(Direction::Inbound) != EndpointState::Open
    }

    #[inline]
    pub async fn push_msg(&self, buf: Vec<u8>) -> Result<(), ()> {
        self.push(InItem::Msg(buf)).await
    }

    /// Open -> HalfClosed, then queue the completion behind pending messages
    pub async fn push_close(&self) -> Result<(), ()> {
        match self.call.half_close(Direction::Inbound) {
            Ok(true) => self.push(InItem::Close).await,
            Ok(false) => {
                self.call.fail(CallError::Transport(RpcIntErr::Decode));
                Err(())
            }
            Err(_) => Err(()),
        }
    }

    #[inline]
    pub fn fail(&self, err: CallError) {
        self.call.fail(err);
    }

    /// The peer sent an Error frame
    #[inline]
    pub fn fail_remote(&self, err: CallError) {
        self.call.fail_remote(err);
    }

    async fn push(&self, item: InItem) -> Result<(), ()> {
        match Cancellable::new(self.tx.send(item), self.call.failed()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => {
                // The consumer dropped the inbound handle
                self.call.fail(CallError::Cancelled);
                Err(())
            }
            Err(()) => Err(()),
        }
    }
}
