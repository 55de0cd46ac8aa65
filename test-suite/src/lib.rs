pub mod client;
pub mod server;

#[cfg(test)]
mod basic;

#[macro_use]
extern crate captains_log;
extern crate log;
pub use captains_log::logfn;
pub use duplex_rpc_core::runtime::AsyncIO;

use captains_log::*;
use rstest::*;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

pub type RT = duplex_rpc_tokio::TokioRT;

pub type Codec = duplex_rpc_codec::MsgpCodec;

#[fixture]
pub fn runner() -> TestRunner {
    TestRunner::new()
}

impl fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "")
    }
}

pub struct TestRunner {
    rt: Runtime,
}

impl TestRunner {
    pub fn new() -> Self {
        recipe::raw_file_logger("/tmp/rpc_test.log", Level::Trace).test().build().expect("log");
        Self {
            rt: tokio::runtime::Builder::new_multi_thread()
                .worker_threads(8)
                .enable_all()
                .build()
                .unwrap(),
        }
    }

    pub fn block_on<F: Future<Output = ()> + Send + 'static>(&self, f: F) {
        self.rt.block_on(f);
    }
}

/// Poll `cond` until true, panic after `timeout`
pub async fn wait_until<C: Fn() -> bool>(cond: C, timeout: Duration) {
    let start = Instant::now();
    while !cond() {
        if start.elapsed() > timeout {
            panic!("condition not met within {:?}", timeout);
        }
        RT::sleep(Duration::from_millis(10)).await;
    }
}
