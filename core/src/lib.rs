//! # duplex-rpc-core
//!
//! Common pieces shared by the crates of the duplex-rpc workspace: the [Codec] trait,
//! client / server configs, the error taxonomy of a call, async I/O traits and the
//! runtime adapter interface.

mod codec;
pub use codec::Codec;
mod config;
pub use config::*;
pub mod error;
pub mod io;
pub mod runtime;
