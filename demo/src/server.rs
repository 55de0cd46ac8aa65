//! The demo server: all four ops on one listener, closed gracefully on shutdown

use crate::service::demo_services;
use duplex_rpc_stream::server::{RpcServer, ServerFacts};
use duplex_rpc_tcp::TcpTransport;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

pub struct DemoServer<F: ServerFacts> {
    server: RpcServer<F>,
    local_addr: String,
}

impl<F: ServerFacts> DemoServer<F> {
    pub fn start(facts: Arc<F>, addr: &str, pacing: Duration) -> io::Result<Self> {
        let mut server = RpcServer::new(facts, demo_services(pacing));
        let local_addr = server.listen::<TcpTransport>(addr)?;
        Ok(Self { server, local_addr })
    }

    #[inline]
    pub fn local_addr(&self) -> &str {
        &self.local_addr
    }

    /// Serve until `shutdown` resolves, then close the server
    pub async fn run_until<S: Future>(mut self, shutdown: S) {
        shutdown.await;
        info!("demo server on {} shutting down", self.local_addr);
        self.server.close().await;
    }
}
