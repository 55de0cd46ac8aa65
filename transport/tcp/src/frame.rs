use crate::net::{TcpConn, TcpReadHalf, TcpWriteHalf};
use captains_log::filter::LogFilter;
use duplex_rpc_core::error::RpcIntErr;
use duplex_rpc_core::io::{AsyncBufReader, AsyncBufWriter, AsyncRead, AsyncWrite, io_with_timeout};
use duplex_rpc_core::runtime::AsyncIO;
use duplex_rpc_stream::proto::{FRAME_HEAD_LEN, FrameHead, FrameKind, MAX_FRAME_LEN};
use duplex_rpc_stream::transport::{Frame, FrameReader, FrameWriter};
use std::sync::Arc;
use std::time::Duration;
use std::{fmt, io};
use zerocopy::AsBytes;

pub const DEFAULT_BUF_SIZE: usize = 8 * 1024;

/// Timeouts and buffer size of one connection
#[derive(Clone, Copy, Debug)]
pub(crate) struct ConnSetting {
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub idle_timeout: Duration,
    pub buf_size: usize,
}

pub(crate) fn split_frames<IO: AsyncIO>(
    conn: TcpConn<IO>, setting: ConnSetting, logger: Arc<LogFilter>, conn_count: Option<Arc<()>>,
) -> (TcpFrameReader<IO>, TcpFrameWriter<IO>) {
    let name = format!("{:?}", conn);
    let buf_size = if setting.buf_size > 0 { setting.buf_size } else { DEFAULT_BUF_SIZE };
    let (rd, wr) = conn.split();
    let reader = TcpFrameReader {
        stream: AsyncBufReader::new(rd, buf_size),
        buf: Vec::new(),
        read_timeout: setting.read_timeout,
        idle_timeout: setting.idle_timeout,
        name: name.clone(),
        logger: logger.clone(),
        _conn_count: conn_count.clone(),
    };
    let writer = TcpFrameWriter {
        stream: AsyncBufWriter::new(wr, buf_size),
        write_timeout: setting.write_timeout,
        name,
        logger,
        _conn_count: conn_count,
    };
    (reader, writer)
}

pub struct TcpFrameReader<IO: AsyncIO> {
    stream: AsyncBufReader<TcpReadHalf<IO>>,
    buf: Vec<u8>,
    read_timeout: Duration,
    idle_timeout: Duration,
    name: String,
    logger: Arc<LogFilter>,
    _conn_count: Option<Arc<()>>,
}

impl<IO: AsyncIO> fmt::Debug for TcpFrameReader<IO> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "conn {} reader", self.name)
    }
}

impl<IO: AsyncIO> FrameReader for TcpFrameReader<IO> {
    async fn read_frame(&mut self, idle: bool) -> Result<Frame<'_>, RpcIntErr> {
        let mut head_buf = [0u8; FRAME_HEAD_LEN];
        let head_timeout = if idle { self.idle_timeout } else { Duration::ZERO };
        if let Err(e) = io_with_timeout!(IO, head_timeout, self.stream.read_exact(&mut head_buf)) {
            return Err(match e.kind() {
                io::ErrorKind::UnexpectedEof => RpcIntErr::Closed,
                io::ErrorKind::TimedOut => {
                    logger_debug!(self.logger, "{:?} idle timeout", self);
                    RpcIntErr::Timeout
                }
                _ => {
                    logger_debug!(self.logger, "{:?} read head err: {}", self, e);
                    RpcIntErr::IO
                }
            });
        }
        let head = match FrameHead::decode_head(&head_buf) {
            Ok(head) => head,
            Err(e) => {
                logger_warn!(self.logger, "{:?} bad frame head: {}", self, e);
                return Err(e);
            }
        };
        self.buf.resize(head.len as usize, 0);
        if head.len > 0 {
            if let Err(e) =
                io_with_timeout!(IO, self.read_timeout, self.stream.read_exact(&mut self.buf))
            {
                logger_debug!(self.logger, "{:?} read payload err: {}", self, e);
                return Err(if e.kind() == io::ErrorKind::TimedOut {
                    RpcIntErr::Timeout
                } else {
                    RpcIntErr::IO
                });
            }
        }
        Ok(Frame { kind: head.kind, seq: head.seq, payload: &self.buf })
    }
}

pub struct TcpFrameWriter<IO: AsyncIO> {
    stream: AsyncBufWriter<TcpWriteHalf<IO>>,
    write_timeout: Duration,
    name: String,
    logger: Arc<LogFilter>,
    _conn_count: Option<Arc<()>>,
}

impl<IO: AsyncIO> fmt::Debug for TcpFrameWriter<IO> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "conn {} writer", self.name)
    }
}

impl<IO: AsyncIO> FrameWriter for TcpFrameWriter<IO> {
    async fn write_frame(&mut self, kind: FrameKind, seq: u64, payload: &[u8]) -> io::Result<()> {
        if payload.len() > MAX_FRAME_LEN as usize {
            logger_warn!(self.logger, "{:?} frame of {} bytes exceeds limit", self, payload.len());
            return Err(io::ErrorKind::InvalidInput.into());
        }
        let head = FrameHead::new(kind, seq, payload.len() as u32);
        logger_trace!(self.logger, "{:?} write {:?}", self, head);
        io_with_timeout!(IO, self.write_timeout, self.stream.write_all(head.as_bytes()))?;
        if !payload.is_empty() {
            io_with_timeout!(IO, self.write_timeout, self.stream.write_all(payload))?;
        }
        Ok(())
    }

    #[inline]
    async fn flush(&mut self) -> io::Result<()> {
        io_with_timeout!(IO, self.write_timeout, self.stream.flush())
    }

    async fn close(&mut self) {
        if let Err(e) = self.flush().await {
            logger_debug!(self.logger, "{:?} flush on close: {}", self, e);
        }
        if let Err(e) = self.stream.get_inner().shutdown_write().await {
            logger_trace!(self.logger, "{:?} shutdown: {}", self, e);
        }
    }
}
