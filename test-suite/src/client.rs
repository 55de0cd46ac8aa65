use duplex_rpc_demo::client::DemoClient;
use duplex_rpc_stream::client::ClientConfig;
use duplex_rpc_tcp::TcpTransport;
use duplex_rpc_tokio::{ClientDefault, TokioRT};

pub type Facts = ClientDefault<TcpTransport, crate::Codec>;

pub fn init_client(config: ClientConfig, addr: &str) -> DemoClient<Facts> {
    let facts = Facts::new(config, TokioRT::current());
    DemoClient::new(facts, addr)
}
