//! The module contains traits defined for the client-side

pub use duplex_rpc_core::ClientConfig;

mod call;
pub use call::ClientCall;

mod client;
pub use client::RpcClient;

use crate::call::CallObserver;
use crate::transport::ClientTransport;
use captains_log::filter::LogFilter;
use duplex_rpc_core::{Codec, runtime::AsyncIO};
use std::future::Future;
use std::sync::Arc;

/// A trait implemented by the user for the client-side, to define the customizable plugin.
pub trait ClientFacts: Send + Sync + Sized + 'static {
    /// Define the codec to serialization and deserialization
    ///
    /// Refers to [duplex_rpc_core::Codec]
    type Codec: Codec;

    /// Define the adaptor of async runtime
    type IO: AsyncIO;

    /// Define the transport layer protocol
    type Transport: ClientTransport<Self::IO>;

    /// You should keep ClientConfig inside, get_config() will return the reference.
    fn get_config(&self) -> &ClientConfig;

    /// Construct a [captains_log::filter::Filter](https://docs.rs/captains-log/latest/captains_log/filter/trait.Filter.html) to organize log of a client
    fn new_logger(&self) -> Arc<LogFilter>;

    fn spawn_detach<F, R>(&self, f: F)
    where
        F: Future<Output = R> + Send + 'static,
        R: Send + 'static;

    /// The hook invoked on every endpoint transition of every call
    #[inline]
    fn new_observer(&self) -> Option<Arc<dyn CallObserver>> {
        None
    }
}

/// An example ClientFacts for general use
pub struct ClientDefault<T: ClientTransport<IO>, IO: AsyncIO, C: Codec> {
    pub logger: Arc<LogFilter>,
    config: ClientConfig,
    rt: IO,
    _phan: std::marker::PhantomData<fn(&C, &T)>,
}

impl<T: ClientTransport<IO>, IO: AsyncIO, C: Codec> ClientDefault<T, IO, C> {
    pub fn new(config: ClientConfig, rt: IO) -> Arc<Self> {
        Arc::new(Self { logger: Arc::new(LogFilter::new()), config, rt, _phan: Default::default() })
    }

    #[inline]
    pub fn set_log_level(&self, level: log::Level) {
        self.logger.set_level(level);
    }
}

impl<T: ClientTransport<IO>, IO: AsyncIO, C: Codec> ClientFacts for ClientDefault<T, IO, C> {
    type Codec = C;
    type IO = IO;
    type Transport = T;

    #[inline]
    fn new_logger(&self) -> Arc<LogFilter> {
        self.logger.clone()
    }

    #[inline]
    fn get_config(&self) -> &ClientConfig {
        &self.config
    }

    #[inline]
    fn spawn_detach<F, R>(&self, f: F)
    where
        F: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        self.rt.spawn_detach(f);
    }
}
