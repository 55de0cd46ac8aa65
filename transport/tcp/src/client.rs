use crate::TcpTransport;
use crate::frame::{ConnSetting, TcpFrameReader, TcpFrameWriter, split_frames};
use crate::net::{TcpConn, resolve_addr};
use captains_log::filter::LogFilter;
use duplex_rpc_core::runtime::AsyncIO;
use duplex_rpc_core::{ClientConfig, error::RpcIntErr};
use duplex_rpc_stream::transport::ClientTransport;
use std::sync::Arc;

impl<IO: AsyncIO> ClientTransport<IO> for TcpTransport {
    type Reader = TcpFrameReader<IO>;
    type Writer = TcpFrameWriter<IO>;

    async fn connect(
        addr: &str, config: &ClientConfig, logger: Arc<LogFilter>,
    ) -> Result<(Self::Reader, Self::Writer), RpcIntErr> {
        let sock_addr = match resolve_addr(addr) {
            Ok(a) => a,
            Err(e) => {
                logger_warn!(logger, "cannot resolve addr {:?}: {}", addr, e);
                return Err(RpcIntErr::Unreachable);
            }
        };
        match IO::connect_tcp(&sock_addr, config.connect_timeout).await {
            Ok(fd) => {
                let conn = TcpConn::<IO>::new(fd);
                logger_trace!(logger, "connected {:?}", conn);
                let setting = ConnSetting {
                    read_timeout: config.read_timeout,
                    write_timeout: config.write_timeout,
                    idle_timeout: config.idle_timeout,
                    buf_size: config.stream_buf_size,
                };
                Ok(split_frames(conn, setting, logger, None))
            }
            Err(e) => {
                logger_warn!(logger, "cannot connect addr {:?}: {}", addr, e);
                Err(RpcIntErr::Unreachable)
            }
        }
    }
}
