//! I/O utilities

use pin_project_lite::pin_project;
use std::future::Future;
use std::pin::Pin;
use std::task::*;
use std::{fmt, io};

mod buf_io;
pub use buf_io::{AsyncBufReader, AsyncBufWriter, AsyncRead, AsyncWrite};

pin_project! {
    /// Cancellable races `future` against `cancel_future`,
    /// and gives up on `future` when `cancel_future` returns first.
    ///
    /// The `cancel_future` can be a timer or a notification channel recv()
    pub struct Cancellable<F, C> {
        #[pin]
        future: F,
        #[pin]
        cancel_future: C,
    }
}

impl<F: Future + Send, C: Future + Send> Cancellable<F, C> {
    pub fn new(future: F, cancel_future: C) -> Self {
        Self { future, cancel_future }
    }
}

impl<F: Future + Send, C: Future + Send> Future for Cancellable<F, C> {
    type Output = Result<F::Output, ()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        if let Poll::Ready(output) = this.future.poll(cx) {
            return Poll::Ready(Ok(output));
        }
        if let Poll::Ready(_) = this.cancel_future.poll(cx) {
            return Poll::Ready(Err(()));
        }
        return Poll::Pending;
    }
}

/// Run an io future with a timeout, zero Duration means no timeout.
///
/// The timer error is converted to `io::ErrorKind::TimedOut`
#[macro_export(local_inner_macros)]
macro_rules! io_with_timeout {
    ($IO: path, $timeout: expr, $f: expr) => {{
        if $timeout == std::time::Duration::from_secs(0) {
            $f.await
        } else {
            match <$IO as $crate::runtime::AsyncIO>::timeout($timeout, $f).await {
                Ok(Ok(r)) => Ok(r),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(std::io::ErrorKind::TimedOut.into()),
            }
        }
    }};
}
pub use io_with_timeout;

/// Interface for transport server listener
pub trait AsyncListener: Send + Sized + 'static + fmt::Debug {
    type Conn: Send + 'static + Sized;

    fn bind(addr: &str) -> io::Result<Self>;

    fn accept(&mut self) -> impl Future<Output = io::Result<Self::Conn>> + Send;

    fn local_addr(&self) -> io::Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancellable() {
        let r = Cancellable::new(async { 1 }, tokio::time::sleep(Duration::from_secs(1))).await;
        assert_eq!(r, Ok(1));
        let r = Cancellable::new(
            tokio::time::sleep(Duration::from_secs(5)),
            tokio::time::sleep(Duration::from_millis(10)),
        )
        .await;
        assert!(r.is_err());
    }
}
