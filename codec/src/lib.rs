#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # duplex-rpc-codec
//!
//! [Codec](duplex_rpc_core::Codec) implementations for the messages and frame payloads
//! of duplex-rpc. The `msgpack` feature (default) provides [MsgpCodec].

pub use duplex_rpc_core::Codec;
#[cfg(feature = "msgpack")]
mod msgpack;
#[cfg(feature = "msgpack")]
pub use msgpack::*;
