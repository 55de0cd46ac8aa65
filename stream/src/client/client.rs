use crate::call::CallShared;
use crate::client::{ClientCall, ClientFacts};
use crate::context::CallContext;
use crate::endpoint::{Inbound, Outbound, inbound_channel, outbound_channel};
use crate::engine::CallShape;
use crate::proto::{FrameKind, OpenReq};
use crate::session::{io_err_code, pump_inbound, pump_outbound};
use crate::transport::{ClientTransport, FrameWriter};
use captains_log::filter::LogFilter;
use duplex_rpc_core::Codec;
use duplex_rpc_core::error::{CallError, RpcIntErr};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opens calls to one server address, each call on its own connection.
pub struct RpcClient<F: ClientFacts> {
    facts: Arc<F>,
    addr: String,
    codec: Arc<F::Codec>,
    logger: Arc<LogFilter>,
    call_id: AtomicU64,
}

impl<F: ClientFacts> fmt::Debug for RpcClient<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "rpc client {}", self.addr)
    }
}

impl<F: ClientFacts> RpcClient<F> {
    pub fn new(facts: Arc<F>, addr: &str) -> Self {
        let logger = facts.new_logger();
        Self {
            facts,
            addr: addr.to_string(),
            codec: Arc::new(F::Codec::default()),
            logger,
            call_id: AtomicU64::new(0),
        }
    }

    /// Connect and send the `Open` frame of `op`, then start the frame pumps.
    ///
    /// Fails with `Transport(Unreachable)` when the server cannot be reached. A server
    /// refusing the call (unknown op or mismatched shape) is observed by the first
    /// operation on the returned call.
    pub async fn open<Req, Resp>(
        &self, op: &str, shape: CallShape, ctx: CallContext,
    ) -> Result<ClientCall<Req, Resp>, CallError>
    where
        Req: Serialize + Send + 'static,
        Resp: DeserializeOwned + Send + 'static,
    {
        let (reader, mut writer) =
            F::Transport::connect(&self.addr, self.facts.get_config(), self.logger.clone())
                .await?;
        let open = OpenReq { op: op.to_string(), shape: shape as u8 };
        let payload = self.codec.encode(&open).map_err(|_| RpcIntErr::Encode)?;
        if let Err(e) = writer.write_frame(FrameKind::Open, 0, &payload).await {
            return Err(CallError::Transport(io_err_code(&e)));
        }
        if let Err(e) = writer.flush().await {
            return Err(CallError::Transport(io_err_code(&e)));
        }
        let id = self.call_id.fetch_add(1, Ordering::Relaxed);
        let call =
            CallShared::new(format!("{}#{}", op, id), self.logger.clone(), self.facts.new_observer());
        logger_debug!(self.logger, "{:?} open {} to {}", call, shape, self.addr);
        let (feed, raw_in) = inbound_channel(&call);
        let (raw_out, drain) = outbound_channel(&call);
        self.facts.spawn_detach(pump_inbound(reader, feed, self.codec.clone(), 0, None));
        self.facts.spawn_detach(pump_outbound(writer, drain, self.codec.clone(), 1));
        self.facts.spawn_detach(ctx.watch::<F::IO>(call.clone()));
        let outbound = Outbound::new(raw_out, self.codec.clone(), shape.requests());
        let inbound = Inbound::new(raw_in, self.codec.clone(), shape.responses());
        Ok(ClientCall::new(outbound, inbound, call))
    }

    /// One request, one response
    pub async fn unary<Req, Resp>(
        &self, op: &str, req: Req, ctx: CallContext,
    ) -> Result<Resp, CallError>
    where
        Req: Serialize + Send + 'static,
        Resp: DeserializeOwned + Send + 'static,
    {
        let call = self.open::<Req, Resp>(op, CallShape::Unary, ctx).await?;
        call.send(req).await?;
        Self::single(call.finish().await?)
    }

    /// One request, then the responses as they arrive
    pub async fn server_streaming<Req, Resp>(
        &self, op: &str, req: Req, ctx: CallContext,
    ) -> Result<Inbound<Resp>, CallError>
    where
        Req: Serialize + Send + 'static,
        Resp: DeserializeOwned + Send + 'static,
    {
        let call = self.open::<Req, Resp>(op, CallShape::ServerStreaming, ctx).await?;
        call.send(req).await?;
        call.close_send().await?;
        let (_outbound, inbound) = call.split();
        Ok(inbound)
    }

    /// All the requests, then one response
    pub async fn client_streaming<Req, Resp, I>(
        &self, op: &str, reqs: I, ctx: CallContext,
    ) -> Result<Resp, CallError>
    where
        Req: Serialize + Send + 'static,
        Resp: DeserializeOwned + Send + 'static,
        I: IntoIterator<Item = Req>,
    {
        let call = self.open::<Req, Resp>(op, CallShape::ClientStreaming, ctx).await?;
        for req in reqs {
            call.send(req).await?;
        }
        Self::single(call.finish().await?)
    }

    /// Both directions streaming independently
    #[inline]
    pub async fn bidi<Req, Resp>(
        &self, op: &str, ctx: CallContext,
    ) -> Result<ClientCall<Req, Resp>, CallError>
    where
        Req: Serialize + Send + 'static,
        Resp: DeserializeOwned + Send + 'static,
    {
        self.open(op, CallShape::Bidi, ctx).await
    }

    #[inline]
    fn single<Resp>(mut resps: Vec<Resp>) -> Result<Resp, CallError> {
        match resps.pop() {
            Some(resp) => Ok(resp),
            None => Err(CallError::invalid_state("no response")),
        }
    }
}
