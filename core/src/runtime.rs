//! Adaptor interface between the call engine and an async runtime.
//!
//! The engine only needs timers, spawning, TCP connect and readiness of non-blocking
//! fds. The tokio implementation lives in
//! [duplex-rpc-tokio](https://docs.rs/duplex-rpc-tokio).

use crate::io::Cancellable;
use std::future::Future;
use std::io;
use std::net::{SocketAddr, TcpStream};
use std::ops::Deref;
use std::os::fd::{AsFd, AsRawFd};
use std::time::Duration;

/// Readiness an fd is registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdInterest {
    /// Listeners
    Read,
    /// Connections
    ReadWrite,
}

/// A registered non-blocking fd.
///
/// `f` is retried until it stops returning `WouldBlock`. Both methods take `&self`, so the
/// read half and the write half of a connection share one registration.
pub trait AsyncFdTrait<T: AsRawFd + AsFd + Send + Sync + 'static>:
    Send + Sync + 'static + Deref<Target = T>
{
    fn async_read<R>(
        &self, f: impl FnMut(&T) -> io::Result<R> + Send,
    ) -> impl Future<Output = io::Result<R>> + Send;

    fn async_write<R>(
        &self, f: impl FnMut(&T) -> io::Result<R> + Send,
    ) -> impl Future<Output = io::Result<R>> + Send;
}

pub trait AsyncIO: Send + Sync + Clone + 'static {
    type AsyncFd<T: AsRawFd + AsFd + Send + Sync + 'static>: AsyncFdTrait<T>;

    fn sleep(d: Duration) -> impl Future + Send;

    /// Err(()) when `d` elapsed first
    #[inline]
    fn timeout<F>(d: Duration, func: F) -> impl Future<Output = Result<F::Output, ()>> + Send
    where
        F: Future + Send,
    {
        Cancellable::new(func, Self::sleep(d))
    }

    /// Zero `timeout` waits as long as the OS does
    fn connect_tcp(
        addr: &SocketAddr, timeout: Duration,
    ) -> impl Future<Output = io::Result<Self::AsyncFd<TcpStream>>> + Send;

    /// `fd` must already be non-blocking
    fn register_fd<T: AsRawFd + AsFd + Send + Sync + 'static>(
        fd: T, interest: FdInterest,
    ) -> io::Result<Self::AsyncFd<T>>;

    /// Run `f` in the background on the runtime captured by `self`
    fn spawn_detach<F, R>(&self, f: F)
    where
        F: Future<Output = R> + Send + 'static,
        R: Send + 'static;
}
