#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # duplex-rpc-tcp
//!
//! This crate provides a TCP transport implementation for [`duplex-rpc-stream`](https://docs.rs/duplex-rpc-stream).
//! It is used for both client and server communication over TCP.
//!
//! One connection carries one call, split into a frame reader and a frame writer.

#[macro_use]
extern crate captains_log;
mod client;
mod frame;
pub use frame::{DEFAULT_BUF_SIZE, TcpFrameReader, TcpFrameWriter};
pub mod net;
mod server;

/// Implements both [ClientTransport](duplex_rpc_stream::transport::ClientTransport) and
/// [ServerTransport](duplex_rpc_stream::transport::ServerTransport) over TCP, for any
/// runtime adaptor.
pub struct TcpTransport;
