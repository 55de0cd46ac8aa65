use crate::call::CallShared;
use crate::endpoint::{inbound_channel, outbound_channel};
use crate::engine::CallShape;
use crate::proto::{FrameKind, OpenReq};
use crate::server::*;
use crate::session::{pump_inbound, pump_outbound, write_error};
use crate::transport::{FrameReader, FrameWriter, ServerTransport};
use captains_log::filter::LogFilter;
use futures::future::{AbortHandle, Abortable};
use duplex_rpc_core::{error::*, io::AsyncListener, io::Cancellable, runtime::AsyncIO};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// An RpcServer that listen, accept, and serve calls, according to ServerFacts interface.
///
/// Each accepted connection carries one call: the server reads the `Open` frame, looks up
/// the operation in the [ServiceMap], then runs the reaction on a fresh duplex engine.
pub struct RpcServer<F>
where
    F: ServerFacts,
{
    listeners_abort: Vec<(AbortHandle, String)>,
    logger: Arc<LogFilter>,
    facts: Arc<F>,
    services: Arc<ServiceMap<F>>,
    codec: Arc<F::Codec>,
    conn_ref_count: Arc<()>,
    call_count: Arc<AtomicU64>,
    server_close_tx: Option<crossfire::MTx<()>>,
    server_close_rx: crossfire::MAsyncRx<()>,
}

impl<F> RpcServer<F>
where
    F: ServerFacts,
{
    pub fn new(facts: Arc<F>, services: ServiceMap<F>) -> Self {
        let (tx, rx) = crossfire::mpmc::unbounded_async();
        Self {
            listeners_abort: Vec::new(),
            logger: facts.new_logger(),
            facts,
            services: Arc::new(services),
            codec: Arc::new(F::Codec::default()),
            conn_ref_count: Arc::new(()),
            call_count: Arc::new(AtomicU64::new(0)),
            server_close_tx: Some(tx),
            server_close_rx: rx,
        }
    }

    /// Returns the bound local address
    pub fn listen<T: ServerTransport<F::IO>>(&mut self, addr: &str) -> io::Result<String> {
        match <T::Listener as AsyncListener>::bind(addr) {
            Err(e) => {
                error!("bind addr {:?} err: {}", addr, e);
                return Err(e);
            }
            Ok(mut listener) => {
                let local_addr = listener.local_addr()?;
                let (abort_handle, abort_registration) = AbortHandle::new_pair();
                let facts = self.facts.clone();
                let services = self.services.clone();
                let codec = self.codec.clone();
                let conn_ref_count = self.conn_ref_count.clone();
                let call_count = self.call_count.clone();
                let listener_info = format!("listener {:?}", local_addr);
                let server_close_rx = self.server_close_rx.clone();
                debug!("listening on {:?}", listener);
                let abrt = Abortable::new(
                    async move {
                        loop {
                            match listener.accept().await {
                                Err(e) => {
                                    warn!("{:?} accept error: {}", listener, e);
                                    return;
                                }
                                Ok(stream) => {
                                    let logger = facts.new_logger();
                                    let (reader, writer) = match T::new_conn(
                                        stream,
                                        facts.get_config(),
                                        conn_ref_count.clone(),
                                        logger,
                                    ) {
                                        Ok(conn) => conn,
                                        Err(e) => {
                                            warn!("{:?} setup conn error: {}", listener, e);
                                            continue;
                                        }
                                    };
                                    let id = call_count.fetch_add(1, Ordering::Relaxed);
                                    facts.spawn_detach(Self::serve_conn(
                                        id,
                                        reader,
                                        writer,
                                        facts.clone(),
                                        services.clone(),
                                        codec.clone(),
                                        server_close_rx.clone(),
                                    ));
                                }
                            }
                        }
                    },
                    abort_registration,
                );

                self.facts.spawn_detach(abrt);
                self.listeners_abort.push((abort_handle, listener_info));
                return Ok(local_addr);
            }
        }
    }

    /// Handshake then drive one call
    async fn serve_conn<R: FrameReader, W: FrameWriter>(
        id: u64, mut reader: R, mut writer: W, facts: Arc<F>, services: Arc<ServiceMap<F>>,
        codec: Arc<F::Codec>, server_close_rx: crossfire::MAsyncRx<()>,
    ) {
        let logger = facts.new_logger();
        // The reader applies the idle timeout
        let open = match Cancellable::new(reader.read_frame(true), server_close_rx.recv()).await {
            // server closing
            Err(()) => return,
            Ok(Err(e)) => Err(e),
            Ok(Ok(frame)) => {
                if frame.kind != FrameKind::Open || frame.seq != 0 {
                    logger_warn!(logger, "conn#{} expect open but got {:?}", id, frame);
                    Err(RpcIntErr::Decode)
                } else {
                    codec.decode::<OpenReq>(frame.payload).map_err(|_| RpcIntErr::Decode)
                }
            }
        };
        let open = match open {
            Ok(open) => open,
            Err(RpcIntErr::Closed) => {
                logger_debug!(logger, "{:?} closed before open", reader);
                writer.close().await;
                return;
            }
            Err(e) => {
                Self::reject(&mut writer, &codec, &logger, CallError::Transport(e)).await;
                return;
            }
        };
        let Some(entry) = services.get(&open.op) else {
            logger_warn!(logger, "{:?} op {:?} not found", reader, open.op);
            Self::reject(&mut writer, &codec, &logger, CallError::Transport(RpcIntErr::Method))
                .await;
            return;
        };
        let shape = entry.shape();
        if CallShape::try_from(open.shape) != Ok(shape) {
            let err = CallError::invalid_state(format!(
                "op {} is {}, not shape {}",
                open.op, shape, open.shape
            ));
            Self::reject(&mut writer, &codec, &logger, err).await;
            return;
        }
        let call = CallShared::new(format!("{}#{}", open.op, id), logger.clone(), facts.new_observer());
        logger_debug!(logger, "{:?} start as {}", call, shape);
        let (feed, raw_in) = inbound_channel(&call);
        let (raw_out, drain) = outbound_channel(&call);
        let engine = entry.start(&codec, call.clone(), raw_in, raw_out);
        facts.spawn_detach(pump_inbound(reader, feed, codec.clone(), 1, Some(server_close_rx)));
        facts.spawn_detach(pump_outbound(writer, drain, codec.clone(), 0));
        let res = engine.await;
        logger_debug!(logger, "{:?} end: {:?}", call, res);
    }

    async fn reject<W: FrameWriter>(
        writer: &mut W, codec: &F::Codec, logger: &LogFilter, err: CallError,
    ) {
        logger_debug!(logger, "{:?} reject: {}", writer, err);
        if let Err(e) = write_error(writer, codec, 0, &err).await {
            logger_debug!(logger, "{:?} cannot write reject: {}", writer, e);
        }
        writer.close().await;
    }

    #[inline]
    fn get_alive_conn(&self) -> usize {
        Arc::strong_count(&self.conn_ref_count) - 1
    }

    /// Gracefully close the server
    ///
    /// Steps:
    /// - listeners coroutine is abort
    /// - drop the close channel to notify connection read coroutines, which fail their
    /// calls with `Transport(Closed)`
    /// - wait for connection coroutines to exit with a timeout defined by
    /// ServerConfig.server_close_wait
    pub async fn close(&mut self) {
        for h in &self.listeners_abort {
            h.0.abort();
            logger_info!(self.logger, "{} has closed", h.1);
        }
        self.listeners_abort.clear();
        let _ = self.server_close_tx.take();

        let mut exists_count = self.get_alive_conn();
        let start_ts = Instant::now();
        let config = self.facts.get_config();
        while exists_count > 0 {
            <F::IO as AsyncIO>::sleep(Duration::from_millis(100)).await;
            exists_count = self.get_alive_conn();
            if Instant::now().duration_since(start_ts) > config.server_close_wait {
                logger_warn!(
                    self.logger,
                    "closed as wait too long for all conn closed voluntarily({} conn left)",
                    exists_count,
                );
                break;
            }
        }
        logger_info!(self.logger, "server closed with alive conn {}", exists_count);
    }
}
