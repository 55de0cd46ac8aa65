//! Error taxonomy of a call.
//!
//! [RpcIntErr] are the transport level codes, [CallError] is what a driver or a reaction
//! observes as the terminal outcome of a call, and [WireError] is how a [CallError]
//! travels to the peer inside an `Error` frame.

use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const RPC_ERR_PREFIX: &'static str = "rpc_";

/// "rpc_" prefix is reserved for internal error
///
/// NOTE: the errors before RpcIntErr::Method are caused by the channel, not by the peer logic
#[derive(
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    PartialEq,
    Eq,
    PartialOrd,
    Clone,
    Copy,
    thiserror::Error,
)]
#[repr(u8)]
pub enum RpcIntErr {
    /// Connect error
    #[strum(serialize = "rpc_unreachable")]
    Unreachable = 0,
    /// IO error
    #[strum(serialize = "rpc_io_err")]
    IO = 1,
    /// Idle or deadline timeout
    #[strum(serialize = "rpc_timeout")]
    Timeout = 2,
    /// The peer went away before completing the call
    #[strum(serialize = "rpc_closed")]
    Closed = 3,
    /// Operation not registered on the server
    #[strum(serialize = "rpc_method_notfound")]
    Method = 4,
    #[strum(serialize = "rpc_encode")]
    Encode = 5,
    /// Frame layout or sequence error
    #[strum(serialize = "rpc_decode")]
    Decode = 6,
    #[strum(serialize = "rpc_internal_err")]
    Internal = 7,
    /// invalid version number in frame header
    #[strum(serialize = "rpc_invalid_ver")]
    Version = 8,
}

// The default Debug derive ignores the strum customized string
impl fmt::Debug for RpcIntErr {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<std::io::Error> for RpcIntErr {
    #[inline(always)]
    fn from(_e: std::io::Error) -> Self {
        Self::IO
    }
}

/// The terminal error of a call, captured once and reported to both the local driver
/// and the peer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    /// Operation on an endpoint in a terminal or incompatible state
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Channel fault
    #[error("transport: {0}")]
    Transport(RpcIntErr),
    /// The codec failed to decode a received message
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    /// Raised by the reaction of the peer or of the local side
    #[error("application: {0}")]
    Application(String),
    /// Explicit cancellation by the caller
    #[error("cancelled")]
    Cancelled,
}

impl From<RpcIntErr> for CallError {
    #[inline(always)]
    fn from(e: RpcIntErr) -> Self {
        Self::Transport(e)
    }
}

impl CallError {
    #[inline]
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    #[inline]
    pub fn application(msg: impl Into<String>) -> Self {
        Self::Application(msg.into())
    }

    pub fn to_wire(&self) -> WireError {
        let (kind, message) = match self {
            Self::InvalidState(s) => (WIRE_INVALID_STATE, s.clone()),
            Self::Transport(e) => (WIRE_TRANSPORT, e.as_ref().to_string()),
            Self::MalformedMessage(s) => (WIRE_MALFORMED, s.clone()),
            Self::Application(s) => (WIRE_APPLICATION, s.clone()),
            Self::Cancelled => (WIRE_CANCELLED, String::new()),
        };
        WireError { kind, message }
    }

    /// Unknown kinds and unparsable transport codes decode as `Transport(Internal)`
    pub fn from_wire(e: WireError) -> Self {
        match e.kind {
            WIRE_INVALID_STATE => Self::InvalidState(e.message),
            WIRE_TRANSPORT => {
                if e.message.starts_with(RPC_ERR_PREFIX) {
                    if let Ok(code) = RpcIntErr::from_str(&e.message) {
                        return Self::Transport(code);
                    }
                }
                Self::Transport(RpcIntErr::Internal)
            }
            WIRE_MALFORMED => Self::MalformedMessage(e.message),
            WIRE_APPLICATION => Self::Application(e.message),
            WIRE_CANCELLED => Self::Cancelled,
            _ => Self::Transport(RpcIntErr::Internal),
        }
    }
}

const WIRE_INVALID_STATE: u8 = 1;
const WIRE_TRANSPORT: u8 = 2;
const WIRE_MALFORMED: u8 = 3;
const WIRE_APPLICATION: u8 = 4;
const WIRE_CANCELLED: u8 = 5;

/// Payload of an `Error` frame
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WireError {
    pub kind: u8,
    pub message: String,
}
