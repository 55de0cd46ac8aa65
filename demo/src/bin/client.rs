use captains_log::recipe;
use duplex_rpc_codec::MsgpCodec;
use duplex_rpc_demo::{DEMO_ADDR, client::DemoClient, msg::ChatRequest};
use duplex_rpc_stream::client::ClientConfig;
use duplex_rpc_stream::context::CallContext;
use duplex_rpc_tcp::TcpTransport;
use duplex_rpc_tokio::{ClientDefault, TokioRT};
use log::Level;
use std::time::Duration;

const CALL_TIMEOUT: Duration = Duration::from_secs(10);

const CHAT_LINES: [&str; 4] =
    ["Hello!", "How are you?", "I'm learning RPC!", "Bidirectional streaming is cool!"];

type Client = DemoClient<ClientDefault<TcpTransport, MsgpCodec>>;

fn main() {
    if let Err(e) = recipe::raw_file_logger("/tmp/duplex_demo_client.log", Level::Debug).build() {
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
        let facts = ClientDefault::<TcpTransport, MsgpCodec>::new(
            ClientConfig::default(),
            TokioRT::current(),
        );
        let client = DemoClient::new(facts, DEMO_ADDR);
        hello(&client).await;
        numbers(&client).await;
        average(&client).await;
        chat(&client).await;
    });
}

async fn hello(client: &Client) {
    match client.say_hello("World", CallContext::with_timeout(CALL_TIMEOUT)).await {
        Ok(message) => println!("Greeting: {}", message),
        Err(e) => eprintln!("SayHello failed: {}", e),
    }
}

async fn numbers(client: &Client) {
    let mut numbers = match client.get_numbers(1, 5, CallContext::with_timeout(CALL_TIMEOUT)).await
    {
        Ok(inbound) => inbound,
        Err(e) => {
            eprintln!("GetNumbers failed: {}", e);
            return;
        }
    };
    loop {
        match numbers.next_message().await {
            Ok(Some(resp)) => println!("Received number: {}", resp.number),
            Ok(None) => {
                println!("Server has completed sending numbers");
                return;
            }
            Err(e) => {
                eprintln!("GetNumbers failed: {}", e);
                return;
            }
        }
    }
}

async fn average(client: &Client) {
    let input = [10, 20, 30, 40, 50];
    println!("Sending numbers: {:?}", input);
    match client.calculate_average(&input, CallContext::with_timeout(CALL_TIMEOUT)).await {
        Ok(avg) => println!("Average: {}", avg),
        Err(e) => eprintln!("CalculateAverage failed: {}", e),
    }
}

async fn chat(client: &Client) {
    let call = match client.chat(CallContext::with_timeout(CALL_TIMEOUT)).await {
        Ok(call) => call,
        Err(e) => {
            eprintln!("Chat failed: {}", e);
            return;
        }
    };
    let (outbound, mut inbound) = call.split();
    let sender = tokio::spawn(async move {
        for line in CHAT_LINES {
            let req = ChatRequest { user: "Client".to_string(), message: line.to_string() };
            if let Err(e) = outbound.send(req).await {
                eprintln!("send failed: {}", e);
                return;
            }
            println!("Sent: {}", line);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        if let Err(e) = outbound.close_send().await {
            eprintln!("close failed: {}", e);
        }
    });
    loop {
        match inbound.next_message().await {
            Ok(Some(resp)) => println!("Received from {}: {}", resp.user, resp.message),
            Ok(None) => {
                println!("Server has completed sending messages");
                break;
            }
            Err(e) => {
                eprintln!("Chat failed: {}", e);
                break;
            }
        }
    }
    let _ = sender.await;
}
