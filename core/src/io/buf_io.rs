use std::future::Future;
use std::{fmt, io};

/// AsyncRead trait for runtime adapter
pub trait AsyncRead: Send {
    /// On ok, return the bytes read, 0 means EOF
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Fill the whole `buf`, or return `UnexpectedEof` when the peer closed before that.
    fn read_exact<'a>(
        &'a mut self, mut buf: &'a mut [u8],
    ) -> impl Future<Output = io::Result<()>> + Send + 'a {
        async move {
            while !buf.is_empty() {
                match self.read(buf).await {
                    Ok(0) => {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "stream closed before buffer filled",
                        ));
                    }
                    Ok(n) => {
                        let tmp = buf;
                        buf = &mut tmp[n..];
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        }
    }
}

/// AsyncWrite trait for runtime adapter
pub trait AsyncWrite: Send {
    /// On ok, return the bytes written
    fn write(&mut self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;

    fn write_all<'a>(
        &'a mut self, mut buf: &'a [u8],
    ) -> impl Future<Output = io::Result<()>> + Send + 'a {
        async move {
            while !buf.is_empty() {
                match self.write(buf).await {
                    Ok(0) => {
                        return Err(io::Error::new(
                            io::ErrorKind::WriteZero,
                            "failed to write whole buffer",
                        ));
                    }
                    Ok(n) => {
                        buf = &buf[n..];
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(e),
                }
            }
            Ok(())
        }
    }
}

/// Buffered reader half of a connection.
pub struct AsyncBufReader<T: AsyncRead> {
    buf: Vec<u8>,
    pos: usize,
    cap: usize,
    inner: T,
}

impl<T: AsyncRead> AsyncBufReader<T> {
    #[inline]
    pub fn new(inner: T, capacity: usize) -> Self {
        assert!(capacity > 0, "capacity {} must > 0", capacity);
        Self { buf: vec![0; capacity], pos: 0, cap: 0, inner }
    }

    #[inline(always)]
    pub fn get_inner(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Bytes already fetched from the inner reader but not consumed
    #[inline(always)]
    pub fn buffered(&self) -> usize {
        self.cap - self.pos
    }
}

impl<T: AsyncRead> AsyncRead for AsyncBufReader<T> {
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send {
        async move {
            if self.pos < self.cap {
                let n = std::cmp::min(buf.len(), self.cap - self.pos);
                buf[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            // Large reads skip the internal buffer
            if buf.len() >= self.buf.len() {
                return self.inner.read(buf).await;
            }
            self.cap = self.inner.read(&mut self.buf).await?;
            self.pos = 0;
            let n = std::cmp::min(buf.len(), self.cap);
            buf[..n].copy_from_slice(&self.buf[..n]);
            self.pos = n;
            Ok(n)
        }
    }
}

impl<T: AsyncRead + fmt::Debug> fmt::Debug for AsyncBufReader<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.inner.fmt(f)
    }
}

/// Buffered writer half of a connection.
///
/// Data only reaches the inner writer when the buffer overflows or on [flush](Self::flush).
pub struct AsyncBufWriter<T: AsyncWrite> {
    buf: Vec<u8>,
    pos: usize,
    inner: T,
}

impl<T: AsyncWrite> AsyncBufWriter<T> {
    #[inline]
    pub fn new(inner: T, capacity: usize) -> Self {
        assert!(capacity > 0, "capacity {} must > 0", capacity);
        Self { buf: vec![0; capacity], pos: 0, inner }
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        if self.pos > 0 {
            self.inner.write_all(&self.buf[..self.pos]).await?;
            self.pos = 0;
        }
        Ok(())
    }

    #[inline(always)]
    pub fn get_inner(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: AsyncWrite> AsyncWrite for AsyncBufWriter<T> {
    fn write(&mut self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send {
        async move {
            if buf.len() >= self.buf.len() {
                self.flush().await?;
                return self.inner.write(buf).await;
            }
            if self.buf.len() - self.pos < buf.len() {
                self.flush().await?;
            }
            let n = buf.len();
            self.buf[self.pos..self.pos + n].copy_from_slice(buf);
            self.pos += n;
            Ok(n)
        }
    }
}

impl<T: AsyncWrite + fmt::Debug> fmt::Debug for AsyncBufWriter<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.inner.fmt(f)
    }
}
