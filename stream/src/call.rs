//! Lifecycle of one duplex call.
//!
//! [CallState] is the pure state machine over the two directions. [CallShared] wraps it
//! for the endpoints, the frame pumps and the driver of one call, and turns terminal
//! transitions into notifications:
//!
//! - `failed()` resolves once the call moved to [CallPhase::Failed]
//! - `wait_terminal()` resolves once the call is Closed or Failed
//!
//! Both notifications drop a channel sender, the way server shutdown is signalled to
//! connection readers.

use captains_log::filter::LogFilter;
use crossfire::{MAsyncRx, MTx};
use duplex_rpc_core::error::CallError;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Direction {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum EndpointState {
    Open,
    /// Outbound: local closeSend() queued. Inbound: peer closed, messages may be pending.
    HalfClosed,
    /// Outbound: the close reached the transport. Inbound: the consumer observed completion.
    Closed,
    Errored,
}

impl EndpointState {
    #[inline(always)]
    fn is_final(self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum CallPhase {
    Active,
    /// One direction finished, the other still open
    HalfDuplex,
    Closed,
    Failed,
}

/// One endpoint transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub direction: Direction,
    pub from: EndpointState,
    pub to: EndpointState,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}->{}", self.direction, self.from, self.to)
    }
}

/// (inbound state, outbound state, terminal error)
#[derive(Debug, Clone)]
pub struct CallState {
    inbound: EndpointState,
    outbound: EndpointState,
    error: Option<CallError>,
    error_from_peer: bool,
}

impl Default for CallState {
    fn default() -> Self {
        Self {
            inbound: EndpointState::Open,
            outbound: EndpointState::Open,
            error: None,
            error_from_peer: false,
        }
    }
}

impl CallState {
    #[inline]
    pub fn get(&self, dir: Direction) -> EndpointState {
        match dir {
            Direction::Inbound => self.inbound,
            Direction::Outbound => self.outbound,
        }
    }

    pub fn phase(&self) -> CallPhase {
        use EndpointState::*;
        if self.inbound == Errored || self.outbound == Errored {
            return CallPhase::Failed;
        }
        if self.inbound == Closed && self.outbound == Closed {
            return CallPhase::Closed;
        }
        if self.inbound != Open || self.outbound != Open {
            return CallPhase::HalfDuplex;
        }
        CallPhase::Active
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase(), CallPhase::Closed | CallPhase::Failed)
    }

    #[inline]
    pub fn error(&self) -> Option<&CallError> {
        self.error.as_ref()
    }

    /// The terminal error was received from the peer, rather than raised locally
    #[inline]
    pub fn error_from_peer(&self) -> bool {
        self.error_from_peer
    }

    fn set(&mut self, dir: Direction, to: EndpointState) -> Transition {
        let slot = match dir {
            Direction::Inbound => &mut self.inbound,
            Direction::Outbound => &mut self.outbound,
        };
        let from = *slot;
        *slot = to;
        Transition { direction: dir, from, to }
    }

    /// Open -> HalfClosed.
    ///
    /// No-op when already HalfClosed or Closed, InvalidState when Errored.
    pub fn half_close(&mut self, dir: Direction) -> Result<Option<Transition>, CallError> {
        match self.get(dir) {
            EndpointState::Open => Ok(Some(self.set(dir, EndpointState::HalfClosed))),
            EndpointState::HalfClosed | EndpointState::Closed => Ok(None),
            EndpointState::Errored => {
                Err(CallError::invalid_state(format!("{} endpoint errored", dir)))
            }
        }
    }

    /// HalfClosed -> Closed
    pub fn finish(&mut self, dir: Direction) -> Result<Option<Transition>, CallError> {
        match self.get(dir) {
            EndpointState::HalfClosed => Ok(Some(self.set(dir, EndpointState::Closed))),
            EndpointState::Closed => Ok(None),
            EndpointState::Open => {
                Err(CallError::invalid_state(format!("{} endpoint still open", dir)))
            }
            EndpointState::Errored => {
                Err(CallError::invalid_state(format!("{} endpoint errored", dir)))
            }
        }
    }

    /// Capture the terminal error and force every non-final endpoint to Errored.
    ///
    /// Idempotent once failed, and a no-op once the call is Closed.
    pub fn fail(&mut self, err: CallError, from_peer: bool) -> Vec<Transition> {
        let mut transitions = Vec::new();
        if self.error.is_some() || self.phase() == CallPhase::Closed {
            return transitions;
        }
        self.error = Some(err);
        self.error_from_peer = from_peer;
        for dir in [Direction::Inbound, Direction::Outbound] {
            if !self.get(dir).is_final() {
                transitions.push(self.set(dir, EndpointState::Errored));
            }
        }
        transitions
    }
}

/// The observability hook of a call, invoked on each endpoint transition with the phase
/// of the call after the transition.
pub trait CallObserver: Send + Sync + 'static {
    fn on_transition(&self, phase: CallPhase, transition: &Transition);
}

/// Writes every transition to the logger at trace level
pub struct LogObserver {
    logger: Arc<LogFilter>,
}

impl LogObserver {
    pub fn new(logger: Arc<LogFilter>) -> Arc<Self> {
        Arc::new(Self { logger })
    }
}

impl CallObserver for LogObserver {
    fn on_transition(&self, phase: CallPhase, transition: &Transition) {
        logger_trace!(self.logger, "call {}: {}", phase, transition);
    }
}

/// State of one call shared by its endpoints, pumps and driver.
pub struct CallShared {
    name: String,
    state: Mutex<CallState>,
    fail_tx: Mutex<Option<MTx<()>>>,
    fail_rx: MAsyncRx<()>,
    terminal_tx: Mutex<Option<MTx<()>>>,
    terminal_rx: MAsyncRx<()>,
    observer: Option<Arc<dyn CallObserver>>,
    logger: Arc<LogFilter>,
}

impl fmt::Debug for CallShared {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "call {}", self.name)
    }
}

impl CallShared {
    pub fn new(
        name: impl Into<String>, logger: Arc<LogFilter>, observer: Option<Arc<dyn CallObserver>>,
    ) -> Arc<Self> {
        let (fail_tx, fail_rx) = crossfire::mpmc::unbounded_async();
        let (terminal_tx, terminal_rx) = crossfire::mpmc::unbounded_async();
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(CallState::default()),
            fail_tx: Mutex::new(Some(fail_tx)),
            fail_rx,
            terminal_tx: Mutex::new(Some(terminal_tx)),
            terminal_rx,
            observer,
            logger,
        })
    }

    #[inline(always)]
    pub fn get_logger(&self) -> &Arc<LogFilter> {
        &self.logger
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, CallState> {
        // A poisoned lock still holds a consistent state, transitions never panic midway
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the current state
    #[inline]
    pub fn state(&self) -> CallState {
        self.lock().clone()
    }

    #[inline]
    pub fn endpoint_state(&self, dir: Direction) -> EndpointState {
        self.lock().get(dir)
    }

    #[inline]
    pub fn phase(&self) -> CallPhase {
        self.lock().phase()
    }

    #[inline]
    pub fn error(&self) -> Option<CallError> {
        self.lock().error.clone()
    }

    pub fn half_close(&self, dir: Direction) -> Result<bool, CallError> {
        let (t, phase) = {
            let mut state = self.lock();
            let t = state.half_close(dir)?;
            (t, state.phase())
        };
        if let Some(t) = t {
            self.notify(phase, &[t]);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn finish(&self, dir: Direction) -> Result<(), CallError> {
        let (t, phase) = {
            let mut state = self.lock();
            let t = state.finish(dir)?;
            (t, state.phase())
        };
        if let Some(t) = t {
            self.notify(phase, &[t]);
        }
        Ok(())
    }

    /// Fail the call with an error raised locally. Idempotent.
    #[inline]
    pub fn fail(&self, err: CallError) {
        self._fail(err, false)
    }

    /// Fail the call with an error received in an `Error` frame.
    #[inline]
    pub fn fail_remote(&self, err: CallError) {
        self._fail(err, true)
    }

    fn _fail(&self, err: CallError, from_peer: bool) {
        let (transitions, phase) = {
            let mut state = self.lock();
            let t = state.fail(err.clone(), from_peer);
            (t, state.phase())
        };
        if transitions.is_empty() {
            logger_trace!(self.logger, "{:?} ignore error {} after terminal", self, err);
            return;
        }
        logger_debug!(self.logger, "{:?} failed (from_peer={}): {}", self, from_peer, err);
        self.notify(phase, &transitions);
    }

    fn notify(&self, phase: CallPhase, transitions: &[Transition]) {
        if let Some(observer) = self.observer.as_ref() {
            for t in transitions {
                observer.on_transition(phase, t);
            }
        }
        match phase {
            CallPhase::Failed => {
                let _ = self.fail_tx.lock().unwrap_or_else(|e| e.into_inner()).take();
                let _ = self.terminal_tx.lock().unwrap_or_else(|e| e.into_inner()).take();
            }
            CallPhase::Closed => {
                logger_trace!(self.logger, "{:?} closed", self);
                let _ = self.terminal_tx.lock().unwrap_or_else(|e| e.into_inner()).take();
            }
            _ => {}
        }
    }

    /// Resolve once the call failed
    #[inline]
    pub async fn failed(&self) {
        let _ = self.fail_rx.recv().await;
    }

    /// Resolve once the call reached Closed or Failed
    #[inline]
    pub async fn wait_terminal(&self) {
        let _ = self.terminal_rx.recv().await;
    }

    /// The single outcome of a terminal call.
    ///
    /// InvalidState when the call is not terminal yet.
    pub fn outcome(&self) -> Result<(), CallError> {
        let state = self.lock();
        match state.phase() {
            CallPhase::Closed => Ok(()),
            CallPhase::Failed => match state.error.as_ref() {
                Some(e) => Err(e.clone()),
                None => Err(CallError::invalid_state("failed without error")),
            },
            phase => Err(CallError::invalid_state(format!("call still {}", phase))),
        }
    }
}
