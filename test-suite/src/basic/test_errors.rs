use crate::server::*;
use crate::{client::*, *};
use duplex_rpc_core::error::{CallError, RpcIntErr};
use duplex_rpc_demo::OP_HELLO;
use duplex_rpc_demo::msg::{ChatRequest, HelloResponse};
use duplex_rpc_stream::client::ClientConfig;
use duplex_rpc_stream::context::CallContext;
use duplex_rpc_stream::engine::CallShape;
use duplex_rpc_stream::server::ServerConfig;
use std::sync::Arc;
use std::time::Duration;

#[logfn]
#[rstest]
fn test_unknown_op(runner: TestRunner) {
    runner.block_on(async move {
        let recorder = Arc::new(PhaseRecorder::default());
        let (mut server, addr) =
            init_server(ServerConfig::default(), Duration::ZERO, recorder.clone())
                .expect("server listen");
        let client = init_client(ClientConfig::default(), &addr);
        let mut call = client
            .inner()
            .open::<String, String>("no.SuchOp", CallShape::Bidi, CallContext::default())
            .await
            .expect("open");
        assert_eq!(call.next_message().await, Err(CallError::Transport(RpcIntErr::Method)));
        // The terminal error sticks
        assert_eq!(call.next_message().await, Err(CallError::Transport(RpcIntErr::Method)));
        assert!(call.send("late".to_string()).await.is_err());
        server.close().await;
    });
}

#[logfn]
#[rstest]
fn test_shape_mismatch(runner: TestRunner) {
    runner.block_on(async move {
        let recorder = Arc::new(PhaseRecorder::default());
        let (mut server, addr) =
            init_server(ServerConfig::default(), Duration::ZERO, recorder.clone())
                .expect("server listen");
        let client = init_client(ClientConfig::default(), &addr);
        let mut call = client
            .inner()
            .open::<String, HelloResponse>(OP_HELLO, CallShape::Bidi, CallContext::default())
            .await
            .expect("open");
        let r = call.next_message().await;
        assert!(matches!(r, Err(CallError::InvalidState(_))), "{:?}", r);
        server.close().await;
    });
}

#[logfn]
#[rstest]
fn test_application_error(runner: TestRunner) {
    runner.block_on(async move {
        let recorder = Arc::new(PhaseRecorder::default());
        let (mut server, addr) =
            init_server(ServerConfig::default(), Duration::ZERO, recorder.clone())
                .expect("server listen");
        let client = init_client(ClientConfig::default(), &addr);
        let mut call = client
            .inner()
            .bidi::<String, String>(OP_FAIL, CallContext::default())
            .await
            .expect("open");
        call.send("a".to_string()).await.expect("send");
        assert_eq!(call.next_message().await, Ok(Some("a".to_string())));
        call.send("boom".to_string()).await.expect("send");
        assert_eq!(call.next_message().await, Err(CallError::application("boom")));
        let r = call.finish().await;
        assert_eq!(r.unwrap_err(), CallError::application("boom"));
        wait_until(|| recorder.failed() > 0, Duration::from_secs(3)).await;
        assert_eq!(recorder.closed(), 0);
        server.close().await;
    });
}

#[logfn]
#[rstest]
fn test_malformed_message(runner: TestRunner) {
    runner.block_on(async move {
        let recorder = Arc::new(PhaseRecorder::default());
        let (mut server, addr) =
            init_server(ServerConfig::default(), Duration::ZERO, recorder.clone())
                .expect("server listen");
        let client = init_client(ClientConfig::default(), &addr);
        // A bare integer is not a HelloRequest
        let r = client
            .inner()
            .unary::<u32, HelloResponse>(OP_HELLO, 7, CallContext::default())
            .await;
        assert!(matches!(r, Err(CallError::MalformedMessage(_))), "{:?}", r);

        // The server keeps serving other calls
        let msg = client.say_hello("again", CallContext::default()).await.expect("say_hello");
        assert_eq!(msg, "Hello, again!");
        server.close().await;
    });
}

#[logfn]
#[rstest]
fn test_unreachable(runner: TestRunner) {
    runner.block_on(async move {
        let client = init_client(ClientConfig::default(), "127.0.0.1:1");
        let r = client.say_hello("nobody", CallContext::default()).await;
        assert_eq!(r, Err(CallError::Transport(RpcIntErr::Unreachable)));
        let r = client.chat(CallContext::default()).await;
        assert_eq!(r.err(), Some(CallError::Transport(RpcIntErr::Unreachable)));
    });
}

#[logfn]
#[rstest]
fn test_idle_timeout(runner: TestRunner) {
    runner.block_on(async move {
        let recorder = Arc::new(PhaseRecorder::default());
        let (mut server, addr) =
            init_server(ServerConfig::default(), Duration::ZERO, recorder.clone())
                .expect("server listen");
        let mut config = ClientConfig::default();
        config.idle_timeout = Duration::from_millis(200);
        let client = init_client(config, &addr);
        let mut call = client
            .inner()
            .bidi::<String, String>(OP_SILENT, CallContext::default())
            .await
            .expect("open");
        call.send("anyone?".to_string()).await.expect("send");
        assert_eq!(call.next_message().await, Err(CallError::Transport(RpcIntErr::Timeout)));
        wait_until(|| recorder.failed() > 0, Duration::from_secs(3)).await;

        // A chatty call stays within the idle timeout
        let mut call = client.chat(CallContext::default()).await.expect("chat");
        for i in 0..3 {
            let req = ChatRequest { user: "Client".to_string(), message: i.to_string() };
            call.send(req).await.expect("send");
            assert!(call.next_message().await.expect("echo").is_some());
            RT::sleep(Duration::from_millis(100)).await;
        }
        let rest = call.finish().await.expect("finish");
        assert_eq!(rest.len(), 1);
        server.close().await;
    });
}

#[logfn]
#[rstest]
fn test_idle_after_half_close(runner: TestRunner) {
    runner.block_on(async move {
        let recorder = Arc::new(PhaseRecorder::default());
        let mut config = ServerConfig::default();
        config.idle_timeout = Duration::from_millis(200);
        // The stream outlives the server idle timeout after the request was closed
        let (mut server, addr) =
            init_server(config, Duration::from_millis(100), recorder.clone())
                .expect("server listen");
        let client = init_client(ClientConfig::default(), &addr);
        let mut inbound =
            client.get_numbers(1, 5, CallContext::default()).await.expect("get_numbers");
        let mut got = Vec::new();
        while let Some(resp) = inbound.next_message().await.expect("next") {
            got.push(resp.number);
        }
        assert_eq!(got, vec![1, 2, 3, 4, 5]);
        wait_until(|| recorder.closed() == 1, Duration::from_secs(3)).await;
        assert_eq!(recorder.failed(), 0);
        server.close().await;
    });
}
