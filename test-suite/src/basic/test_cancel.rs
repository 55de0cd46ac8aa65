use crate::server::*;
use crate::{client::*, *};
use duplex_rpc_core::error::{CallError, RpcIntErr};
use duplex_rpc_demo::msg::ChatRequest;
use duplex_rpc_demo::server::DemoServer;
use duplex_rpc_stream::call::CallPhase;
use duplex_rpc_stream::client::ClientConfig;
use duplex_rpc_stream::context::{CallContext, CancelToken};
use duplex_rpc_stream::server::ServerConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[logfn]
#[rstest]
fn test_deadline(runner: TestRunner) {
    runner.block_on(async move {
        let recorder = Arc::new(PhaseRecorder::default());
        let (mut server, addr) =
            init_server(ServerConfig::default(), Duration::ZERO, recorder.clone())
                .expect("server listen");
        let client = init_client(ClientConfig::default(), &addr);
        let start = Instant::now();
        let mut call = client
            .inner()
            .bidi::<String, String>(OP_SILENT, CallContext::with_timeout(Duration::from_millis(300)))
            .await
            .expect("open");
        call.send("anyone?".to_string()).await.expect("send");
        assert_eq!(call.next_message().await, Err(CallError::Transport(RpcIntErr::Timeout)));
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert_eq!(call.phase(), CallPhase::Failed);
        wait_until(|| recorder.failed() > 0, Duration::from_secs(3)).await;

        // A call finishing in time is not affected
        let msg = client
            .say_hello("quick", CallContext::with_timeout(Duration::from_secs(5)))
            .await
            .expect("say_hello");
        assert_eq!(msg, "Hello, quick!");
        server.close().await;
    });
}

#[logfn]
#[rstest]
fn test_cancel_call(runner: TestRunner) {
    runner.block_on(async move {
        let recorder = Arc::new(PhaseRecorder::default());
        let (mut server, addr) =
            init_server(ServerConfig::default(), Duration::ZERO, recorder.clone())
                .expect("server listen");
        let client = init_client(ClientConfig::default(), &addr);
        let mut call = client.chat(CallContext::default()).await.expect("chat");
        call.send(ChatRequest { user: "Client".to_string(), message: "hi".to_string() })
            .await
            .expect("send");
        assert!(call.next_message().await.expect("echo").is_some());
        call.cancel();
        assert_eq!(call.next_message().await, Err(CallError::Cancelled));
        let r = call
            .send(ChatRequest { user: "Client".to_string(), message: "late".to_string() })
            .await;
        assert!(r.is_err());
        assert_eq!(call.finish().await.unwrap_err(), CallError::Cancelled);
        wait_until(|| recorder.failed() > 0, Duration::from_secs(3)).await;
        server.close().await;
    });
}

#[logfn]
#[rstest]
fn test_cancel_token(runner: TestRunner) {
    runner.block_on(async move {
        let recorder = Arc::new(PhaseRecorder::default());
        let (mut server, addr) =
            init_server(ServerConfig::default(), Duration::from_millis(20), recorder.clone())
                .expect("server listen");
        let client = init_client(ClientConfig::default(), &addr);
        let token = CancelToken::new();
        let mut inbound = client
            .get_numbers(1, 1000, CallContext::with_cancel(token.clone()))
            .await
            .expect("get_numbers");
        let mut got = Vec::new();
        let err = loop {
            match inbound.next_message().await {
                Ok(Some(resp)) => {
                    got.push(resp.number);
                    if got.len() == 5 {
                        token.cancel();
                    }
                }
                Ok(None) => panic!("completed after cancel"),
                Err(e) => break e,
            }
        };
        assert_eq!(err, CallError::Cancelled);
        assert!(got.len() >= 5 && got.len() < 1000);
        assert_eq!(got[..5], [1, 2, 3, 4, 5]);
        wait_until(|| recorder.failed() > 0, Duration::from_secs(3)).await;
        server.close().await;
    });
}

#[logfn]
#[rstest]
fn test_drop_call(runner: TestRunner) {
    runner.block_on(async move {
        let recorder = Arc::new(PhaseRecorder::default());
        let (mut server, addr) =
            init_server(ServerConfig::default(), Duration::from_millis(20), recorder.clone())
                .expect("server listen");
        let client = init_client(ClientConfig::default(), &addr);
        let mut inbound =
            client.get_numbers(1, 1000, CallContext::default()).await.expect("get_numbers");
        assert_eq!(inbound.next_message().await.expect("first").map(|r| r.number), Some(1));
        drop(inbound);
        wait_until(|| recorder.failed() > 0, Duration::from_secs(3)).await;
        assert_eq!(recorder.closed(), 0);
        server.close().await;
    });
}

#[logfn]
#[rstest]
fn test_server_close(runner: TestRunner) {
    runner.block_on(async move {
        let recorder = Arc::new(PhaseRecorder::default());
        let mut config = ServerConfig::default();
        config.server_close_wait = Duration::from_secs(2);
        let (mut server, addr) =
            init_server(config, Duration::ZERO, recorder.clone()).expect("server listen");
        let client = init_client(ClientConfig::default(), &addr);
        let mut call = client
            .inner()
            .bidi::<String, String>(OP_FAIL, CallContext::default())
            .await
            .expect("open");
        call.send("a".to_string()).await.expect("send");
        assert_eq!(call.next_message().await, Ok(Some("a".to_string())));
        server.close().await;
        assert_eq!(call.next_message().await, Err(CallError::Transport(RpcIntErr::Closed)));
        assert!(recorder.failed() > 0);

        // New connections are refused
        let r = client.say_hello("late", CallContext::default()).await;
        assert_eq!(r, Err(CallError::Transport(RpcIntErr::Unreachable)));
    });
}

#[logfn]
#[rstest]
fn test_demo_server_shutdown(runner: TestRunner) {
    runner.block_on(async move {
        let facts = crate::server::Facts::new(ServerConfig::default(), RT::current());
        let server =
            DemoServer::start(facts, "127.0.0.1:0", Duration::ZERO).expect("server listen");
        let addr = server.local_addr().to_string();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let serving = tokio::spawn(server.run_until(async move {
            let _ = stop_rx.await;
        }));
        let client = init_client(ClientConfig::default(), &addr);
        let msg = client.say_hello("World", CallContext::default()).await.expect("say_hello");
        assert_eq!(msg, "Hello, World!");
        assert!(!serving.is_finished());

        stop_tx.send(()).expect("stop");
        serving.await.expect("shut down");
        let r = client.say_hello("late", CallContext::default()).await;
        assert_eq!(r, Err(CallError::Transport(RpcIntErr::Unreachable)));
    });
}
