//! The two coroutines bridging one call to its connection.
//!
//! - [pump_inbound] reads frames of the peer into the inbound endpoint.
//! - [pump_outbound] writes the outbound endpoint as frames, then reports a local failure
//!   to the peer with an `Error` frame before shutting down the connection.

use crate::endpoint::{InboundFeed, OutItem, OutboundDrain};
use crate::proto::FrameKind;
use crate::transport::{FrameReader, FrameWriter};
use crossfire::MAsyncRx;
use duplex_rpc_core::Codec;
use duplex_rpc_core::error::{CallError, RpcIntErr, WireError};
use duplex_rpc_core::io::Cancellable;
use std::io;
use std::sync::Arc;

#[inline]
pub(crate) fn io_err_code(e: &io::Error) -> RpcIntErr {
    if e.kind() == io::ErrorKind::TimedOut { RpcIntErr::Timeout } else { RpcIntErr::IO }
}

/// `next_seq`: seq of the first frame expected.
///
/// `close_ch`: the server shutdown notification.
pub(crate) async fn pump_inbound<R: FrameReader, C: Codec>(
    mut reader: R, feed: InboundFeed, codec: Arc<C>, mut next_seq: u64,
    close_ch: Option<MAsyncRx<()>>,
) {
    let call = feed.call().clone();
    let logger = call.get_logger().clone();
    loop {
        let idle = !feed.peer_closed();
        let read_f = Cancellable::new(reader.read_frame(idle), call.wait_terminal());
        let res = match close_ch.as_ref() {
            Some(ch) => match Cancellable::new(read_f, ch.recv()).await {
                Ok(r) => r,
                Err(()) => {
                    logger_debug!(logger, "{:?} reader: server closing", call);
                    feed.fail(CallError::Transport(RpcIntErr::Closed));
                    break;
                }
            },
            None => read_f.await,
        };
        let frame = match res {
            Err(()) => break,
            Ok(Err(e)) => {
                if e == RpcIntErr::Closed && feed.peer_closed() {
                    logger_trace!(logger, "{:?} reader: peer hung up after close", call);
                } else {
                    logger_debug!(logger, "{:?} reader: {}", call, e);
                    feed.fail(e.into());
                }
                break;
            }
            Ok(Ok(frame)) => frame,
        };
        logger_trace!(logger, "{:?} read {:?}", call, frame);
        if frame.seq != next_seq {
            logger_warn!(logger, "{:?} expect seq {} but got {:?}", call, next_seq, frame);
            feed.fail(CallError::Transport(RpcIntErr::Decode));
            break;
        }
        next_seq += 1;
        match frame.kind {
            FrameKind::Msg => {
                if feed.peer_closed() {
                    logger_warn!(logger, "{:?} message after close", call);
                    feed.fail(CallError::Transport(RpcIntErr::Decode));
                    break;
                }
                let buf = frame.payload.to_vec();
                if feed.push_msg(buf).await.is_err() {
                    break;
                }
            }
            FrameKind::Close => {
                if feed.push_close().await.is_err() {
                    break;
                }
            }
            FrameKind::Error => {
                let err = match codec.decode::<WireError>(frame.payload) {
                    Ok(wire) => CallError::from_wire(wire),
                    Err(()) => CallError::Transport(RpcIntErr::Decode),
                };
                logger_debug!(logger, "{:?} peer error: {}", call, err);
                feed.fail_remote(err);
                break;
            }
            FrameKind::Open => {
                logger_warn!(logger, "{:?} unexpected open", call);
                feed.fail(CallError::Transport(RpcIntErr::Decode));
                break;
            }
        }
    }
    logger_trace!(logger, "{:?} reader exits", call);
}

/// `seq`: seq of the first frame written.
pub(crate) async fn pump_outbound<W: FrameWriter, C: Codec>(
    mut writer: W, mut drain: OutboundDrain, codec: Arc<C>, mut seq: u64,
) {
    let call = drain.call().clone();
    let logger = call.get_logger().clone();
    let write_ok = match write_items(&mut writer, &mut drain, &mut seq).await {
        Ok(()) => true,
        Err(e) => {
            logger_debug!(logger, "{:?} writer: {}", call, e);
            call.fail(CallError::Transport(io_err_code(&e)));
            false
        }
    };
    call.wait_terminal().await;
    let state = call.state();
    if let Some(err) = state.error() {
        if write_ok && !state.error_from_peer() {
            if let Err(e) = write_error(&mut writer, codec.as_ref(), seq, err).await {
                logger_debug!(logger, "{:?} cannot report error to peer: {}", call, e);
            }
        }
    }
    writer.close().await;
    logger_trace!(logger, "{:?} writer exits", call);
}

async fn write_items<W: FrameWriter>(
    writer: &mut W, drain: &mut OutboundDrain, seq: &mut u64,
) -> io::Result<()> {
    macro_rules! process {
        ($item: expr) => {{
            match $item {
                OutItem::Msg(buf) => {
                    writer.write_frame(FrameKind::Msg, *seq, &buf).await?;
                    *seq += 1;
                    false
                }
                OutItem::Close => {
                    writer.write_frame(FrameKind::Close, *seq, &[]).await?;
                    *seq += 1;
                    true
                }
            }
        }};
    }
    while let Some(item) = drain.next().await {
        let mut closed = process!(item);
        while !closed {
            match drain.try_next() {
                Some(item) => closed = process!(item),
                None => break,
            }
        }
        writer.flush().await?;
        if closed {
            drain.closed();
            return Ok(());
        }
    }
    Ok(())
}

/// Write an `Error` frame carrying `err`
pub(crate) async fn write_error<W: FrameWriter, C: Codec>(
    writer: &mut W, codec: &C, seq: u64, err: &CallError,
) -> io::Result<()> {
    let payload = match codec.encode(&err.to_wire()) {
        Ok(buf) => buf,
        Err(()) => return Err(io::Error::other("encode error frame")),
    };
    writer.write_frame(FrameKind::Error, seq, &payload).await?;
    writer.flush().await
}
