#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # duplex-rpc-stream
//!
//! The duplex streaming call engine of `duplex-rpc`.
//!
//! Every call is one of four shapes (unary, server-streaming, client-streaming, bidi), all
//! modelled as two independent directional streams bound under one call state machine:
//!
//! - [endpoint]: the per-direction message sequence with ordering, half-close and
//!   backpressure.
//! - [call]: the lifecycle of a call, terminal error propagation and the observer hook.
//! - [engine]: binds the endpoints and drives a user [Reaction](engine::Reaction).
//! - [client] and [server]: the drivers speaking the [proto] framing over a [transport].
//!
//! ## Components
//!
//! - [`duplex-rpc-core`](https://docs.rs/duplex-rpc-core): Errors, config, I/O and runtime traits.
//! - [`duplex-rpc-codec`](https://docs.rs/duplex-rpc-codec): Provides codecs for serialization, such as `msgpack`.
//! - [`duplex-rpc-tokio`](https://docs.rs/duplex-rpc-tokio): A runtime adapter for the `tokio` runtime.
//! - [`duplex-rpc-tcp`](https://docs.rs/duplex-rpc-tcp): A TCP transport implementation.
//!

#[macro_use]
extern crate captains_log;

pub mod call;
pub mod client;
pub mod context;
pub mod endpoint;
pub mod engine;
pub mod proto;
pub mod server;
mod session;
pub mod transport;

pub use duplex_rpc_core::error;
pub use duplex_rpc_core::{ClientConfig, ServerConfig};
