use std::time::Duration;

/// Settings of the client role.
///
/// A zero `Duration` disables the corresponding timeout.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Bound for reading the remaining part of a frame once its head arrived
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub connect_timeout: Duration,
    /// Bound for waiting the next frame head on an open call
    pub idle_timeout: Duration,
    /// Socket buffer size of the reader and of the writer, 0 means default
    pub stream_buf_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(120),
            stream_buf_size: 0,
        }
    }
}

/// Settings of the server role.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// Bound for waiting the next frame head on an open call
    pub idle_timeout: Duration,
    /// How long `RpcServer::close()` waits for live connections
    pub server_close_wait: Duration,
    pub stream_buf_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(120),
            server_close_wait: Duration::from_secs(10),
            stream_buf_size: 0,
        }
    }
}
