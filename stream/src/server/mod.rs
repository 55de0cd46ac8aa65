//! This module contains traits defined for the server-side
//!

mod service;
pub use service::ServiceMap;

mod server;
pub use server::RpcServer;

pub use duplex_rpc_core::ServerConfig;

use crate::call::CallObserver;
use captains_log::filter::LogFilter;
use duplex_rpc_core::{Codec, runtime::AsyncIO};
use std::{future::Future, sync::Arc};

/// A central hub defined by the user for the server-side, to define the customizable plugin.
pub trait ServerFacts: Sync + Send + 'static + Sized {
    /// Define the codec of messages
    ///
    /// Refers to [duplex_rpc_core::Codec]
    type Codec: Codec;

    /// Define the adaptor of async runtime
    ///
    /// Refers to [duplex_rpc_core::runtime::AsyncIO]
    type IO: AsyncIO;

    /// You should keep ServerConfig inside ServerFacts, get_config() will return the reference.
    fn get_config(&self) -> &ServerConfig;

    /// Construct a [captains_log::filter::Filter](https://docs.rs/captains-log/latest/captains_log/filter/trait.Filter.html) to organize log of the server
    fn new_logger(&self) -> Arc<LogFilter>;

    /// Define how the async runtime spawn a task
    ///
    /// You may spawn with globally runtime, or to a owned runtime executor
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

/// An example ServerFacts for general use
pub struct ServerDefault<IO: AsyncIO, C: Codec> {
    pub logger: Arc<LogFilter>,
    config: ServerConfig,
    rt: IO,
    observer: Option<Arc<dyn CallObserver>>,
    _phan: std::marker::PhantomData<fn(&C)>,
}

impl<IO: AsyncIO, C: Codec> ServerDefault<IO, C> {
    pub fn new(config: ServerConfig, rt: IO) -> Arc<Self> {
        Arc::new(Self {
            logger: Arc::new(LogFilter::new()),
            config,
            rt,
            observer: None,
            _phan: Default::default(),
        })
    }

    pub fn with_observer(config: ServerConfig, rt: IO, observer: Arc<dyn CallObserver>) -> Arc<Self> {
        Arc::new(Self {
            logger: Arc::new(LogFilter::new()),
            config,
            rt,
            observer: Some(observer),
            _phan: Default::default(),
        })
    }

    #[inline]
    pub fn set_log_level(&self, level: log::Level) {
        self.logger.set_level(level);
    }
}

impl<IO: AsyncIO, C: Codec> ServerFacts for ServerDefault<IO, C> {
    type Codec = C;
    type IO = IO;

    #[inline]
    fn new_logger(&self) -> Arc<LogFilter> {
        self.logger.clone()
    }

    #[inline]
    fn get_config(&self) -> &ServerConfig {
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

    #[inline]
    fn new_observer(&self) -> Option<Arc<dyn CallObserver>> {
        self.observer.clone()
    }
}
