//! Interfaces of the transport layer.
//!
//! A connection carries exactly one call, split into a [FrameReader] and a [FrameWriter]
//! owned by two separate coroutines.
//!
//! The implementation can be found on:
//!
//! - [duplex-rpc-tcp](https://docs.rs/duplex-rpc-tcp): For TCP

use crate::proto::FrameKind;
use captains_log::filter::LogFilter;
use duplex_rpc_core::error::RpcIntErr;
use duplex_rpc_core::io::AsyncListener;
use duplex_rpc_core::runtime::AsyncIO;
use duplex_rpc_core::{ClientConfig, ServerConfig};
use std::future::Future;
use std::sync::Arc;
use std::{fmt, io};

/// A validated frame, the payload references the internal buffer of the reader.
pub struct Frame<'a> {
    pub kind: FrameKind,
    pub seq: u64,
    pub payload: &'a [u8],
}

impl<'a> fmt::Debug for Frame<'a> {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "frame(kind={}, seq={}, len={})", self.kind, self.seq, self.payload.len())
    }
}

pub trait FrameReader: Send + Sized + 'static + fmt::Debug {
    /// Read the next frame.
    ///
    /// Returns `RpcIntErr::Closed` on EOF at a frame boundary, `RpcIntErr::Decode` or
    /// `RpcIntErr::Version` on a malformed head. With `idle` set, waiting longer than the
    /// idle timeout for the head returns `RpcIntErr::Timeout`. Once the peer closed its
    /// direction only an `Error` frame or EOF may follow, so the wait is unbounded.
    fn read_frame(
        &mut self, idle: bool,
    ) -> impl Future<Output = Result<Frame<'_>, RpcIntErr>> + Send;
}

pub trait FrameWriter: Send + Sized + 'static + fmt::Debug {
    /// Write a frame, possibly into a buffer
    fn write_frame(
        &mut self, kind: FrameKind, seq: u64, payload: &[u8],
    ) -> impl Future<Output = io::Result<()>> + Send;

    fn flush(&mut self) -> impl Future<Output = io::Result<()>> + Send;

    /// Flush and shutdown the write direction of the connection
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// This trait is for client-side transport layer protocol.
pub trait ClientTransport<IO: AsyncIO>: Send + Sync + 'static {
    type Reader: FrameReader;
    type Writer: FrameWriter;

    /// Establish a connection, `Err(RpcIntErr::Unreachable)` when failed
    fn connect(
        addr: &str, config: &ClientConfig, logger: Arc<LogFilter>,
    ) -> impl Future<Output = Result<(Self::Reader, Self::Writer), RpcIntErr>> + Send;
}

/// This trait is for server-side transport layer protocol.
pub trait ServerTransport<IO: AsyncIO>: Send + Sync + 'static {
    type Listener: AsyncListener;
    type Reader: FrameReader;
    type Writer: FrameWriter;

    /// The implementation is expected to store the conn_count in both halves until dropped
    fn new_conn(
        conn: <Self::Listener as AsyncListener>::Conn, config: &ServerConfig, conn_count: Arc<()>,
        logger: Arc<LogFilter>,
    ) -> io::Result<(Self::Reader, Self::Writer)>;
}
