use captains_log::{filter::LogFilter, recipe};
use duplex_rpc_codec::MsgpCodec;
use duplex_rpc_demo::{DEMO_ADDR, server::DemoServer};
use duplex_rpc_stream::call::LogObserver;
use duplex_rpc_stream::server::ServerConfig;
use duplex_rpc_tokio::{ServerDefault, TokioRT};
use log::Level;
use std::sync::Arc;
use std::time::Duration;

const NUMBER_PACING: Duration = Duration::from_millis(500);

fn main() {
    if let Err(e) = recipe::raw_file_logger("/tmp/duplex_demo_server.log", Level::Trace).build() {
        eprintln!("cannot setup logger: {:?}", e);
    }
    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("cannot start runtime: {}", e);
            return;
        }
    };
    rt.block_on(async {
        // Progress of every call goes to the trace log
        let observer = LogObserver::new(Arc::new(LogFilter::new()));
        let facts = ServerDefault::<MsgpCodec>::with_observer(
            ServerConfig::default(),
            TokioRT::current(),
            observer,
        );
        let server = match DemoServer::start(facts, DEMO_ADDR, NUMBER_PACING) {
            Ok(server) => server,
            Err(e) => {
                eprintln!("cannot listen on {}: {}", DEMO_ADDR, e);
                return;
            }
        };
        println!("Server started, listening on {}", server.local_addr());
        server
            .run_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    eprintln!("cannot wait for ctrl-c: {}", e);
                }
                println!("*** shutting down server");
            })
            .await;
        println!("*** server shut down");
    });
}
