use crate::call::CallShared;
use crate::endpoint::{Inbound, Outbound, RawInbound, RawOutbound};
use crate::engine::{CallShape, DuplexEngine, Reaction};
use crate::server::ServerFacts;
use duplex_rpc_core::Codec;
use duplex_rpc_core::error::CallError;
use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

/// A registered operation with its message types erased
pub(crate) trait ServiceEntry<C: Codec>: Send + Sync + 'static {
    fn shape(&self) -> CallShape;

    /// Bind a fresh reaction to the endpoints of one call
    fn start(
        &self, codec: &Arc<C>, call: Arc<CallShared>, inbound: RawInbound, outbound: RawOutbound,
    ) -> BoxFuture<'static, Result<(), CallError>>;
}

struct Service<R, M> {
    shape: CallShape,
    make: M,
    _phan: PhantomData<fn() -> R>,
}

impl<C, R, M> ServiceEntry<C> for Service<R, M>
where
    C: Codec,
    R: Reaction,
    R::In: DeserializeOwned,
    R::Out: Serialize,
    M: Fn() -> R + Send + Sync + 'static,
{
    #[inline]
    fn shape(&self) -> CallShape {
        self.shape
    }

    fn start(
        &self, codec: &Arc<C>, call: Arc<CallShared>, inbound: RawInbound, outbound: RawOutbound,
    ) -> BoxFuture<'static, Result<(), CallError>> {
        let inbound = Inbound::<R::In>::new(inbound, codec.clone(), self.shape.requests());
        let outbound = Outbound::<R::Out>::new(outbound, codec.clone(), self.shape.responses());
        let engine = DuplexEngine::new((self.make)(), inbound, outbound, call);
        Box::pin(engine.run())
    }
}

/// Operation name -> (call shape, reaction factory).
///
/// Each incoming call gets its own reaction from the factory.
pub struct ServiceMap<F: ServerFacts> {
    services: HashMap<String, Arc<dyn ServiceEntry<F::Codec>>>,
}

impl<F: ServerFacts> ServiceMap<F> {
    pub fn new() -> Self {
        Self { services: HashMap::new() }
    }

    /// Register `op`, replacing any previous registration of the same name
    pub fn register<R, M>(&mut self, op: &str, shape: CallShape, make_reaction: M) -> &mut Self
    where
        R: Reaction,
        R::In: DeserializeOwned,
        R::Out: Serialize,
        M: Fn() -> R + Send + Sync + 'static,
    {
        let entry = Service { shape, make: make_reaction, _phan: PhantomData };
        if self.services.insert(op.to_string(), Arc::new(entry)).is_some() {
            warn!("service {:?} registered twice, the last one wins", op);
        }
        self
    }

    #[inline]
    pub(crate) fn get(&self, op: &str) -> Option<&Arc<dyn ServiceEntry<F::Codec>>> {
        self.services.get(op)
    }
}

impl<F: ServerFacts> Default for ServiceMap<F> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
