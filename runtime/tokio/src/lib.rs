#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # duplex-rpc-tokio
//!
//! Runtime adapter of duplex-rpc for `tokio`, implementing
//! [AsyncIO](duplex_rpc_core::runtime::AsyncIO).
//!
use duplex_rpc_core::io::io_with_timeout;
use duplex_rpc_core::runtime::{AsyncFdTrait, AsyncIO, FdInterest};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::net::TcpStream;
use std::ops::Deref;
use std::os::fd::{AsFd, AsRawFd};
use std::time::Duration;
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;
use tokio::runtime::Handle;

/// The tokio runtime handle, assign this type to the IO of
/// [ClientFacts](duplex_rpc_stream::client::ClientFacts) or
/// [ServerFacts](duplex_rpc_stream::server::ServerFacts).
#[derive(Clone)]
pub struct TokioRT(Handle);

impl TokioRT {
    /// Capture a tokio runtime handle to ensure background task can spawn
    #[inline]
    pub fn new(handle: Handle) -> Self {
        Self(handle)
    }

    /// Capture the handle of the runtime we are running in.
    ///
    /// Panics outside a tokio runtime.
    #[inline]
    pub fn current() -> Self {
        Self(Handle::current())
    }
}

impl AsyncIO for TokioRT {
    type AsyncFd<T: AsRawFd + AsFd + Send + Sync + 'static> = TokioFD<T>;

    #[inline(always)]
    fn sleep(d: Duration) -> impl Future + Send {
        tokio::time::sleep(d)
    }

    #[inline(always)]
    async fn connect_tcp(
        addr: &SocketAddr, timeout: Duration,
    ) -> io::Result<Self::AsyncFd<TcpStream>> {
        let stream = io_with_timeout!(Self, timeout, tokio::net::TcpStream::connect(addr))?;
        stream.set_nodelay(true)?;
        // into_std keeps the socket non-blocking
        Self::register_fd(stream.into_std()?, FdInterest::ReadWrite)
    }

    fn register_fd<T: AsRawFd + AsFd + Send + Sync + 'static>(
        fd: T, interest: FdInterest,
    ) -> io::Result<Self::AsyncFd<T>> {
        let interest = match interest {
            FdInterest::Read => Interest::READABLE,
            FdInterest::ReadWrite => Interest::READABLE | Interest::WRITABLE,
        };
        Ok(TokioFD(AsyncFd::with_interest(fd, interest)?))
    }

    #[inline]
    fn spawn_detach<F, R>(&self, f: F)
    where
        F: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        self.0.spawn(f);
    }
}

/// Associate type for TokioRT
pub struct TokioFD<T: AsRawFd + AsFd + Send + Sync + 'static>(AsyncFd<T>);

impl<T: AsRawFd + AsFd + Send + Sync + 'static> AsyncFdTrait<T> for TokioFD<T> {
    #[inline(always)]
    async fn async_read<R>(&self, f: impl FnMut(&T) -> io::Result<R> + Send) -> io::Result<R> {
        self.0.async_io(Interest::READABLE, f).await
    }

    #[inline(always)]
    async fn async_write<R>(&self, f: impl FnMut(&T) -> io::Result<R> + Send) -> io::Result<R> {
        self.0.async_io(Interest::WRITABLE, f).await
    }
}

impl<T: AsRawFd + AsFd + Send + Sync + 'static> Deref for TokioFD<T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        self.0.get_ref()
    }
}

pub type ClientDefault<T, C> = duplex_rpc_stream::client::ClientDefault<T, TokioRT, C>;
pub type ServerDefault<C> = duplex_rpc_stream::server::ServerDefault<TokioRT, C>;
