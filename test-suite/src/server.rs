use duplex_rpc_demo::service::demo_services;
use duplex_rpc_stream::call::{CallObserver, CallPhase, Transition};
use duplex_rpc_stream::endpoint::Outbound;
use duplex_rpc_stream::engine::{CallShape, Reaction};
use duplex_rpc_stream::error::CallError;
use duplex_rpc_stream::server::{RpcServer, ServerConfig, ServiceMap};
use duplex_rpc_tcp::TcpTransport;
use duplex_rpc_tokio::{ServerDefault, TokioRT};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub type Facts = ServerDefault<crate::Codec>;

/// Bidi op failing the call when it receives "boom", echoes everything else
pub const OP_FAIL: &str = "test.Fail";
/// Bidi op which never answers
pub const OP_SILENT: &str = "test.Silent";

pub struct FailOnBoom;

impl Reaction for FailOnBoom {
    type In = String;
    type Out = String;

    async fn on_message(&mut self, msg: String, out: &Outbound<String>) -> Result<(), CallError> {
        if msg == "boom" {
            return Err(CallError::application("boom"));
        }
        out.send(msg).await
    }
}

pub struct Silent;

impl Reaction for Silent {
    type In = String;
    type Out = String;

    async fn on_message(&mut self, _msg: String, _out: &Outbound<String>) -> Result<(), CallError> {
        Ok(())
    }
}

/// Counts the terminal transitions of all calls on the server
#[derive(Default)]
pub struct PhaseRecorder {
    failed: AtomicUsize,
    closed: AtomicUsize,
}

impl PhaseRecorder {
    #[inline]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl CallObserver for PhaseRecorder {
    fn on_transition(&self, phase: CallPhase, transition: &Transition) {
        debug!("observed {} {}", phase, transition);
        match phase {
            CallPhase::Failed => {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
            CallPhase::Closed => {
                self.closed.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}

/// The demo ops plus the test ops, numbers paced by `pacing`
pub fn test_services(pacing: Duration) -> ServiceMap<Facts> {
    let mut services = demo_services::<Facts>(pacing);
    services
        .register(OP_FAIL, CallShape::Bidi, || FailOnBoom)
        .register(OP_SILENT, CallShape::Bidi, || Silent);
    services
}

/// Listen on a random local port, returns the server and its address
pub fn init_server(
    config: ServerConfig, pacing: Duration, recorder: Arc<PhaseRecorder>,
) -> Result<(RpcServer<Facts>, String), std::io::Error> {
    let facts = Facts::with_observer(config, TokioRT::current(), recorder);
    let mut server = RpcServer::new(facts, test_services(pacing));
    let local_addr = server.listen::<TcpTransport>("127.0.0.1:0")?;
    Ok((server, local_addr))
}
