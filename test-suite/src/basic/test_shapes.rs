use crate::server::*;
use crate::{client::*, *};
use duplex_rpc_demo::msg::{ChatRequest, ChatResponse, NumberResponse};
use duplex_rpc_stream::call::CallPhase;
use duplex_rpc_stream::client::{ClientCall, ClientConfig};
use duplex_rpc_stream::endpoint::Inbound;
use duplex_rpc_stream::context::CallContext;
use duplex_rpc_stream::server::ServerConfig;
use std::sync::Arc;
use std::time::Duration;

#[logfn]
#[rstest]
fn test_unary_hello(runner: TestRunner) {
    runner.block_on(async move {
        let recorder = Arc::new(PhaseRecorder::default());
        let (mut server, addr) =
            init_server(ServerConfig::default(), Duration::ZERO, recorder.clone())
                .expect("server listen");
        let client = init_client(ClientConfig::default(), &addr);
        for name in ["World", "duplex"] {
            let msg = client.say_hello(name, CallContext::default()).await.expect("say_hello");
            assert_eq!(msg, format!("Hello, {}!", name));
        }
        wait_until(|| recorder.closed() == 2, Duration::from_secs(3)).await;
        assert_eq!(recorder.failed(), 0);
        server.close().await;
    });
}

#[logfn]
#[rstest]
#[case(1, 5, Duration::from_millis(20))]
#[case(1, 2000, Duration::ZERO)]
#[case(5, 1, Duration::ZERO)]
#[case(-3, -3, Duration::ZERO)]
fn test_server_streaming(
    runner: TestRunner, #[case] start: i32, #[case] end: i32, #[case] pacing: Duration,
) {
    runner.block_on(async move {
        let recorder = Arc::new(PhaseRecorder::default());
        let (mut server, addr) =
            init_server(ServerConfig::default(), pacing, recorder.clone()).expect("server listen");
        let client = init_client(ClientConfig::default(), &addr);
        let mut inbound =
            client.get_numbers(start, end, CallContext::default()).await.expect("get_numbers");
        let mut got = Vec::new();
        while let Some(resp) = inbound.next_message().await.expect("next") {
            got.push(resp.number);
        }
        assert_eq!(got, (start..=end).collect::<Vec<i32>>());
        // Completion is sticky
        assert!(inbound.next_message().await.expect("after completion").is_none());
        wait_until(|| recorder.closed() == 1, Duration::from_secs(3)).await;
        server.close().await;
    });
}

#[logfn]
#[rstest]
#[case(vec![10, 20, 30, 40, 50], 30.0)]
#[case(vec![], 0.0)]
#[case(vec![i32::MAX, i32::MAX], i32::MAX as f64)]
#[case(vec![1, 2], 1.5)]
fn test_client_streaming(runner: TestRunner, #[case] numbers: Vec<i32>, #[case] expect: f64) {
    runner.block_on(async move {
        let recorder = Arc::new(PhaseRecorder::default());
        let (mut server, addr) =
            init_server(ServerConfig::default(), Duration::ZERO, recorder.clone())
                .expect("server listen");
        let client = init_client(ClientConfig::default(), &addr);
        let avg =
            client.calculate_average(&numbers, CallContext::default()).await.expect("average");
        assert_eq!(avg, expect);
        server.close().await;
    });
}

fn chat_req(message: &str) -> ChatRequest {
    ChatRequest { user: "Client".to_string(), message: message.to_string() }
}

#[logfn]
#[rstest]
fn test_bidi_chat(runner: TestRunner) {
    runner.block_on(async move {
        let recorder = Arc::new(PhaseRecorder::default());
        let (mut server, addr) =
            init_server(ServerConfig::default(), Duration::ZERO, recorder.clone())
                .expect("server listen");
        let client = init_client(ClientConfig::default(), &addr);
        let lines = ["Hello!", "How are you?", "I'm learning RPC!", "Bidirectional streaming is cool!"];

        // Interleaved: each echo arrives before the next line is sent
        let mut call = client.chat(CallContext::default()).await.expect("chat");
        for line in lines {
            call.send(chat_req(line)).await.expect("send");
            let resp = call.next_message().await.expect("echo").expect("not completed");
            assert_eq!(resp.user, "Server");
            assert_eq!(resp.message, format!("Echo: {}", line));
        }
        assert_eq!(call.phase(), CallPhase::Active);
        call.close_send().await.expect("close_send");
        // Idempotent
        call.close_send().await.expect("close_send again");
        assert!(call.send(chat_req("late")).await.is_err());
        let rest = call.finish().await.expect("finish");
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].message, "Goodbye!");

        // All lines first, then the replies in order
        let call = client.chat(CallContext::default()).await.expect("chat");
        for line in lines {
            call.send(chat_req(line)).await.expect("send");
        }
        let rest = call.finish().await.expect("finish");
        let mut expect: Vec<String> = lines.iter().map(|l| format!("Echo: {}", l)).collect();
        expect.push("Goodbye!".to_string());
        assert_eq!(rest.into_iter().map(|r| r.message).collect::<Vec<_>>(), expect);

        // Empty conversation
        let call = client.chat(CallContext::default()).await.expect("chat");
        let rest = call.finish().await.expect("finish");
        assert_eq!(rest.len(), 1);

        wait_until(|| recorder.closed() == 3, Duration::from_secs(3)).await;
        assert_eq!(recorder.failed(), 0);
        server.close().await;
    });
}

#[logfn]
#[rstest]
fn test_bidi_split(runner: TestRunner) {
    runner.block_on(async move {
        let recorder = Arc::new(PhaseRecorder::default());
        let (mut server, addr) =
            init_server(ServerConfig::default(), Duration::ZERO, recorder.clone())
                .expect("server listen");
        let client = init_client(ClientConfig::default(), &addr);
        let call = client.chat(CallContext::default()).await.expect("chat");
        let (outbound, mut inbound) = call.split();
        let count = 500;
        let sender = tokio::spawn(async move {
            for i in 0..count {
                outbound.send(chat_req(&i.to_string())).await.expect("send");
            }
            outbound.close_send().await.expect("close_send");
        });
        let mut got = Vec::new();
        while let Some(resp) = inbound.next_message().await.expect("next") {
            got.push(resp.message);
        }
        sender.await.unwrap();
        assert_eq!(got.len(), count + 1);
        for (i, message) in got[..count].iter().enumerate() {
            assert_eq!(*message, format!("Echo: {}", i));
        }
        assert_eq!(got[count], "Goodbye!");
        server.close().await;
    });
}

fn require_sync<T: Sync>() {}

fn require_send<T: Send>(_f: &T) {}

#[logfn]
#[rstest]
fn test_call_handles_thread_safe(runner: TestRunner) {
    require_sync::<ClientCall<ChatRequest, ChatResponse>>();
    require_sync::<Inbound<NumberResponse>>();
    runner.block_on(async move {
        let client = init_client(ClientConfig::default(), "127.0.0.1:1");
        let numbers = vec![1, 2, 3];
        let f = client.calculate_average(&numbers, CallContext::default());
        require_send(&f);
        assert!(f.await.is_err());
        let f = client.get_numbers(1, 2, CallContext::default());
        require_send(&f);
        assert!(f.await.is_err());
    });
}
