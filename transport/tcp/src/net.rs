//! Async TCP listener and connection halves over the runtime adaptor

use std::{
    fmt, io,
    net::{Shutdown, SocketAddr, TcpListener as StdListener, TcpStream, ToSocketAddrs},
    sync::Arc,
};

use duplex_rpc_core::io::{AsyncListener, AsyncRead, AsyncWrite};
use duplex_rpc_core::runtime::{AsyncFdTrait, AsyncIO, FdInterest};

/// Parse `ip:port`, or resolve `host:port` through the domain name.
///
/// If multiple IP addresses are resolved, only the first result is taken
pub fn resolve_addr(addr: &str) -> io::Result<SocketAddr> {
    if let Ok(a) = addr.parse::<SocketAddr>() {
        return Ok(a);
    }
    match addr.to_socket_addrs()?.next() {
        Some(a) => Ok(a),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("addr {:?} resolved to nothing", addr),
        )),
    }
}

pub struct TcpListener<IO: AsyncIO>(IO::AsyncFd<StdListener>);

impl<IO: AsyncIO> AsyncListener for TcpListener<IO> {
    type Conn = TcpConn<IO>;

    fn bind(addr: &str) -> io::Result<Self> {
        let sock_addr = resolve_addr(addr)?;
        let l = StdListener::bind(sock_addr)?;
        l.set_nonblocking(true)?;
        Ok(Self(IO::register_fd(l, FdInterest::Read)?))
    }

    #[inline]
    async fn accept(&mut self) -> io::Result<TcpConn<IO>> {
        let (stream, _) = self.0.async_read(|l| l.accept()).await?;
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(TcpConn::new(IO::register_fd(stream, FdInterest::ReadWrite)?))
    }

    #[inline]
    fn local_addr(&self) -> io::Result<String> {
        Ok(self.0.local_addr()?.to_string())
    }
}

impl<IO: AsyncIO> fmt::Debug for TcpListener<IO> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.0.local_addr() {
            Ok(addr) => write!(f, "listener {}", addr),
            Err(_) => write!(f, "tcp listener unknown"),
        }
    }
}

/// An established connection, to be split into a read half and a write half owned by two
/// coroutines.
pub struct TcpConn<IO: AsyncIO> {
    fd: Arc<IO::AsyncFd<TcpStream>>,
}

impl<IO: AsyncIO> TcpConn<IO> {
    #[inline]
    pub fn new(fd: IO::AsyncFd<TcpStream>) -> Self {
        Self { fd: Arc::new(fd) }
    }

    pub fn split(self) -> (TcpReadHalf<IO>, TcpWriteHalf<IO>) {
        (TcpReadHalf { fd: self.fd.clone() }, TcpWriteHalf { fd: self.fd })
    }
}

impl<IO: AsyncIO> fmt::Debug for TcpConn<IO> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt_stream(&self.fd, f)
    }
}

fn fmt_stream(s: &TcpStream, f: &mut fmt::Formatter) -> fmt::Result {
    match s.local_addr() {
        Ok(addr) => {
            if let Ok(peer_addr) = s.peer_addr() {
                write!(f, "{}->{}", addr, peer_addr)
            } else {
                write!(f, "{}", addr)
            }
        }
        Err(_) => write!(f, "tcp addr unknown"),
    }
}

pub struct TcpReadHalf<IO: AsyncIO> {
    fd: Arc<IO::AsyncFd<TcpStream>>,
}

pub struct TcpWriteHalf<IO: AsyncIO> {
    fd: Arc<IO::AsyncFd<TcpStream>>,
}

impl<IO: AsyncIO> AsyncRead for TcpReadHalf<IO> {
    #[inline]
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        use std::io::Read;
        self.fd.async_read(|mut stream| stream.read(buf)).await
    }
}

impl<IO: AsyncIO> AsyncWrite for TcpWriteHalf<IO> {
    #[inline]
    async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        use std::io::Write;
        self.fd.async_write(|mut stream| stream.write(buf)).await
    }
}

impl<IO: AsyncIO> TcpWriteHalf<IO> {
    #[inline]
    pub async fn shutdown_write(&mut self) -> io::Result<()> {
        self.fd.async_write(|s| s.shutdown(Shutdown::Write)).await
    }
}

impl<IO: AsyncIO> fmt::Debug for TcpReadHalf<IO> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt_stream(&self.fd, f)
    }
}

impl<IO: AsyncIO> fmt::Debug for TcpWriteHalf<IO> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt_stream(&self.fd, f)
    }
}
