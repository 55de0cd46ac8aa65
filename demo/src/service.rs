//! Server side reactions of the demo ops

use crate::msg::*;
use crate::{OP_AVERAGE, OP_CHAT, OP_HELLO, OP_NUMBERS};
use duplex_rpc_core::runtime::AsyncIO;
use duplex_rpc_stream::endpoint::Outbound;
use duplex_rpc_stream::engine::{CallShape, Reaction};
use duplex_rpc_stream::error::CallError;
use duplex_rpc_stream::server::{ServerFacts, ServiceMap};
use std::marker::PhantomData;
use std::time::Duration;

/// Register the four demo ops, `pacing` is the delay between two numbers of
/// [OP_NUMBERS].
pub fn demo_services<F: ServerFacts>(pacing: Duration) -> ServiceMap<F> {
    let mut services = ServiceMap::new();
    services
        .register(OP_HELLO, CallShape::Unary, || Hello)
        .register(OP_NUMBERS, CallShape::ServerStreaming, move || Numbers::<F::IO>::new(pacing))
        .register(OP_AVERAGE, CallShape::ClientStreaming, || Average::default())
        .register(OP_CHAT, CallShape::Bidi, || Chat);
    services
}

pub struct Hello;

impl Reaction for Hello {
    type In = HelloRequest;
    type Out = HelloResponse;

    async fn on_message(
        &mut self, req: HelloRequest, out: &Outbound<HelloResponse>,
    ) -> Result<(), CallError> {
        info!("hello from {:?}", req.name);
        out.send(HelloResponse { message: format!("Hello, {}!", req.name) }).await
    }
}

/// Emits `start..=end`
pub struct Numbers<IO: AsyncIO> {
    pacing: Duration,
    _phan: PhantomData<fn(&IO)>,
}

impl<IO: AsyncIO> Numbers<IO> {
    pub fn new(pacing: Duration) -> Self {
        Self { pacing, _phan: PhantomData }
    }
}

impl<IO: AsyncIO> Reaction for Numbers<IO> {
    type In = NumberRequest;
    type Out = NumberResponse;

    async fn on_message(
        &mut self, req: NumberRequest, out: &Outbound<NumberResponse>,
    ) -> Result<(), CallError> {
        debug!("numbers {}..={}", req.start, req.end);
        for number in req.start..=req.end {
            out.send(NumberResponse { number }).await?;
            if number < req.end && !self.pacing.is_zero() {
                IO::sleep(self.pacing).await;
            }
        }
        Ok(())
    }
}

/// Running sum and count, the average is sent once the client finished
#[derive(Default)]
pub struct Average {
    sum: i64,
    count: u64,
}

impl Average {
    #[inline]
    pub fn average(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.sum as f64 / self.count as f64 }
    }
}

impl Reaction for Average {
    type In = AverageRequest;
    type Out = AverageResponse;

    async fn on_message(
        &mut self, req: AverageRequest, _out: &Outbound<AverageResponse>,
    ) -> Result<(), CallError> {
        self.sum += req.number as i64;
        self.count += 1;
        Ok(())
    }

    async fn on_inbound_complete(
        &mut self, out: &Outbound<AverageResponse>,
    ) -> Result<(), CallError> {
        debug!("average of {} numbers", self.count);
        out.send(AverageResponse { average: self.average() }).await
    }
}

const CHAT_SERVER_USER: &str = "Server";

/// Echo each line, then say goodbye
pub struct Chat;

impl Reaction for Chat {
    type In = ChatRequest;
    type Out = ChatResponse;

    async fn on_message(
        &mut self, req: ChatRequest, out: &Outbound<ChatResponse>,
    ) -> Result<(), CallError> {
        debug!("chat {}: {}", req.user, req.message);
        let message = format!("Echo: {}", req.message);
        out.send(ChatResponse { user: CHAT_SERVER_USER.to_string(), message }).await
    }

    async fn on_inbound_complete(&mut self, out: &Outbound<ChatResponse>) -> Result<(), CallError> {
        let message = "Goodbye!".to_string();
        out.send(ChatResponse { user: CHAT_SERVER_USER.to_string(), message }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average() {
        let mut a = Average::default();
        assert_eq!(a.average(), 0.0);
        for n in [10, 20, 30, 40, 50] {
            a.sum += n;
            a.count += 1;
        }
        assert_eq!(a.average(), 30.0);
        let mut a = Average::default();
        a.sum = i32::MAX as i64 * 2;
        a.count = 2;
        assert_eq!(a.average(), i32::MAX as f64);
    }
}
