use captains_log::filter::LogFilter;
use duplex_rpc_core::error::RpcIntErr;
use duplex_rpc_core::io::AsyncListener;
use duplex_rpc_core::{ClientConfig, ServerConfig};
use duplex_rpc_stream::proto::FrameKind;
use duplex_rpc_stream::transport::*;
use duplex_rpc_tcp::TcpTransport;
use duplex_rpc_tcp::net::TcpListener;
use duplex_rpc_tokio::TokioRT;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

type Listener = <TcpTransport as ServerTransport<TokioRT>>::Listener;

async fn pair() -> (
    <TcpTransport as ClientTransport<TokioRT>>::Reader,
    <TcpTransport as ClientTransport<TokioRT>>::Writer,
    <TcpTransport as ServerTransport<TokioRT>>::Reader,
    <TcpTransport as ServerTransport<TokioRT>>::Writer,
    Arc<()>,
) {
    let mut listener = Listener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let logger = Arc::new(LogFilter::new());
    let accept = tokio::spawn(async move { listener.accept().await.expect("accept") });
    let (cr, cw) = <TcpTransport as ClientTransport<TokioRT>>::connect(
        &addr,
        &ClientConfig::default(),
        logger.clone(),
    )
    .await
    .expect("connect");
    let conn = accept.await.unwrap();
    let count = Arc::new(());
    let (sr, sw) = <TcpTransport as ServerTransport<TokioRT>>::new_conn(
        conn,
        &ServerConfig::default(),
        count.clone(),
        logger,
    )
    .expect("new_conn");
    (cr, cw, sr, sw, count)
}

#[tokio::test]
async fn test_frames_both_ways() {
    let (mut cr, mut cw, mut sr, mut sw, count) = pair().await;
    assert_eq!(Arc::strong_count(&count), 3);

    cw.write_frame(FrameKind::Open, 0, b"open").await.unwrap();
    cw.write_frame(FrameKind::Msg, 1, b"hello").await.unwrap();
    cw.write_frame(FrameKind::Close, 2, &[]).await.unwrap();
    cw.flush().await.unwrap();
    let expect: [(FrameKind, u64, &[u8]); 3] =
        [(FrameKind::Open, 0, &b"open"[..]), (FrameKind::Msg, 1, &b"hello"[..]), (FrameKind::Close, 2, &b""[..])];
    for (kind, seq, payload) in expect {
        let f = sr.read_frame(true).await.unwrap();
        assert_eq!(f.kind, kind);
        assert_eq!(f.seq, seq);
        assert_eq!(f.payload, payload);
    }

    let big_len = 300 * 1024;
    let writer = tokio::spawn(async move {
        let big = vec![7u8; big_len];
        sw.write_frame(FrameKind::Msg, 0, &big).await.unwrap();
        sw.close().await;
    });
    let f = cr.read_frame(true).await.unwrap();
    assert_eq!(f.payload.len(), big_len);
    assert!(f.payload.iter().all(|b| *b == 7));
    assert_eq!(cr.read_frame(true).await.unwrap_err(), RpcIntErr::Closed);
    writer.await.unwrap();

    drop(sr);
    assert_eq!(Arc::strong_count(&count), 1);
}

#[tokio::test]
async fn test_bad_magic() {
    let mut listener = Listener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let peer = std::thread::spawn(move || {
        let mut s = std::net::TcpStream::connect(addr).unwrap();
        s.write_all(&[b'X'; 16]).unwrap();
        std::thread::sleep(Duration::from_millis(100));
    });
    let conn = listener.accept().await.unwrap();
    let (mut sr, _sw) = <TcpTransport as ServerTransport<TokioRT>>::new_conn(
        conn,
        &ServerConfig::default(),
        Arc::new(()),
        Arc::new(LogFilter::new()),
    )
    .unwrap();
    assert_eq!(sr.read_frame(true).await.unwrap_err(), RpcIntErr::Decode);
    peer.join().unwrap();
}

#[tokio::test]
async fn test_idle_timeout() {
    let mut listener = TcpListener::<TokioRT>::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let accept = tokio::spawn(async move { listener.accept().await.expect("accept") });
    let mut config = ClientConfig::default();
    config.idle_timeout = Duration::from_millis(50);
    let (mut cr, _cw) =
        <TcpTransport as ClientTransport<TokioRT>>::connect(&addr, &config, Arc::new(LogFilter::new()))
            .await
            .unwrap();
    let _conn = accept.await.unwrap();
    assert_eq!(cr.read_frame(true).await.unwrap_err(), RpcIntErr::Timeout);
    // Not bounded once the peer half-closed
    let r = tokio::time::timeout(Duration::from_millis(200), cr.read_frame(false)).await;
    assert!(r.is_err());
}

#[tokio::test]
async fn test_unreachable() {
    let config = ClientConfig::default();
    let r = <TcpTransport as ClientTransport<TokioRT>>::connect(
        "127.0.0.1:1",
        &config,
        Arc::new(LogFilter::new()),
    )
    .await;
    assert_eq!(r.err(), Some(RpcIntErr::Unreachable));
}
