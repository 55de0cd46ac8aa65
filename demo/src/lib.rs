//! # duplex-rpc-demo
//!
//! The four call shapes exercised by four small services:
//!
//! | op | shape |
//! |---|---|
//! | [OP_HELLO] | unary |
//! | [OP_NUMBERS] | server streaming |
//! | [OP_AVERAGE] | client streaming |
//! | [OP_CHAT] | bidi |

#[macro_use]
extern crate captains_log;

pub mod client;
pub mod msg;
pub mod server;
pub mod service;

pub const OP_HELLO: &str = "hello.SayHello";
pub const OP_NUMBERS: &str = "number.GetNumbers";
pub const OP_AVERAGE: &str = "average.CalculateAverage";
pub const OP_CHAT: &str = "chat.Chat";

/// Address of the demo binaries
pub const DEMO_ADDR: &str = "127.0.0.1:50051";
