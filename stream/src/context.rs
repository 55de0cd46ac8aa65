//! Cancellation and deadline of a client call.

use crate::call::CallShared;
use crossfire::{MAsyncRx, MTx};
use duplex_rpc_core::error::{CallError, RpcIntErr};
use duplex_rpc_core::runtime::AsyncIO;
use futures::future::{Either, select};
use std::fmt;
use std::pin::pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct CancelInner {
    tx: Mutex<Option<MTx<()>>>,
    rx: MAsyncRx<()>,
}

/// A clonable cancellation signal, all clones share the same state
#[derive(Clone)]
pub struct CancelToken(Arc<CancelInner>);

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = crossfire::mpmc::unbounded_async();
        Self(Arc::new(CancelInner { tx: Mutex::new(Some(tx)), rx }))
    }

    /// Idempotent
    #[inline]
    pub fn cancel(&self) {
        let _ = self.0.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.tx.lock().unwrap_or_else(|e| e.into_inner()).is_none()
    }

    /// Resolve once cancel() is called on any clone
    #[inline]
    pub async fn cancelled(&self) {
        let _ = self.0.rx.recv().await;
    }
}

impl Default for CancelToken {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CancelToken(cancelled={})", self.is_cancelled())
    }
}

/// Per-call options of the client.
///
/// Cancellation fails the call with `Cancelled`, an elapsed deadline fails it with
/// `Transport(Timeout)`. Both are reported to the server in an `Error` frame.
#[derive(Clone, Default, Debug)]
pub struct CallContext {
    pub cancel: CancelToken,
    /// Deadline of the whole call from its start, None for no deadline
    pub timeout: Option<Duration>,
}

impl CallContext {
    #[inline]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { cancel: CancelToken::new(), timeout: Some(timeout) }
    }

    #[inline]
    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self { cancel, timeout: None }
    }

    /// Watch the call until it is terminal, applying cancellation and deadline
    pub(crate) async fn watch<IO: AsyncIO>(self, call: Arc<CallShared>) {
        let timeout = self.timeout;
        let terminal = pin!(call.wait_terminal());
        let cancelled = pin!(self.cancel.cancelled());
        let deadline = pin!(async move {
            match timeout {
                Some(d) => {
                    IO::sleep(d).await;
                }
                None => futures::future::pending::<()>().await,
            }
        });
        match select(terminal, select(cancelled, deadline)).await {
            Either::Left(_) => {}
            Either::Right((Either::Left(_), _)) => {
                logger_debug!(call.get_logger(), "{:?} cancelled", call);
                call.fail(CallError::Cancelled);
            }
            Either::Right((Either::Right(_), _)) => {
                logger_debug!(call.get_logger(), "{:?} deadline {:?} exceeded", call, timeout);
                call.fail(CallError::Transport(RpcIntErr::Timeout));
            }
        }
    }
}
