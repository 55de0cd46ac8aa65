use crate::TcpTransport;
use crate::frame::{ConnSetting, TcpFrameReader, TcpFrameWriter, split_frames};
use crate::net::{TcpConn, TcpListener};
use captains_log::filter::LogFilter;
use duplex_rpc_core::ServerConfig;
use duplex_rpc_core::runtime::AsyncIO;
use duplex_rpc_stream::transport::ServerTransport;
use std::io;
use std::sync::Arc;

impl<IO: AsyncIO> ServerTransport<IO> for TcpTransport {
    type Listener = TcpListener<IO>;
    type Reader = TcpFrameReader<IO>;
    type Writer = TcpFrameWriter<IO>;

    fn new_conn(
        conn: TcpConn<IO>, config: &ServerConfig, conn_count: Arc<()>, logger: Arc<LogFilter>,
    ) -> io::Result<(Self::Reader, Self::Writer)> {
        logger_trace!(logger, "accepted {:?}", conn);
        let setting = ConnSetting {
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            idle_timeout: config.idle_timeout,
            buf_size: config.stream_buf_size,
        };
        Ok(split_frames(conn, setting, logger, Some(conn_count)))
    }
}
