//! Typed client of the demo ops

use crate::msg::*;
use crate::{OP_AVERAGE, OP_CHAT, OP_HELLO, OP_NUMBERS};
use duplex_rpc_stream::client::{ClientCall, ClientFacts, RpcClient};
use duplex_rpc_stream::context::CallContext;
use duplex_rpc_stream::endpoint::Inbound;
use duplex_rpc_stream::error::CallError;
use std::sync::Arc;

pub struct DemoClient<F: ClientFacts> {
    inner: RpcClient<F>,
}

impl<F: ClientFacts> DemoClient<F> {
    pub fn new(facts: Arc<F>, addr: &str) -> Self {
        Self { inner: RpcClient::new(facts, addr) }
    }

    pub async fn say_hello(&self, name: &str, ctx: CallContext) -> Result<String, CallError> {
        let req = HelloRequest { name: name.to_string() };
        let resp: HelloResponse = self.inner.unary(OP_HELLO, req, ctx).await?;
        Ok(resp.message)
    }

    pub async fn get_numbers(
        &self, start: i32, end: i32, ctx: CallContext,
    ) -> Result<Inbound<NumberResponse>, CallError> {
        self.inner.server_streaming(OP_NUMBERS, NumberRequest { start, end }, ctx).await
    }

    pub async fn calculate_average(
        &self, numbers: &[i32], ctx: CallContext,
    ) -> Result<f64, CallError> {
        let reqs: Vec<AverageRequest> =
            numbers.iter().map(|n| AverageRequest { number: *n }).collect();
        let resp: AverageResponse = self.inner.client_streaming(OP_AVERAGE, reqs, ctx).await?;
        Ok(resp.average)
    }

    pub async fn chat(
        &self, ctx: CallContext,
    ) -> Result<ClientCall<ChatRequest, ChatResponse>, CallError> {
        self.inner.bidi(OP_CHAT, ctx).await
    }

    #[inline]
    pub fn inner(&self) -> &RpcClient<F> {
        &self.inner
    }
}
