//! Wire framing of a call.
//!
//! One connection carries one call. Each direction is a sequence of frames, each frame
//! is a fixed [FrameHead] followed by `len` bytes of payload.

use duplex_rpc_core::error::RpcIntErr;
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::mem::size_of;
use zerocopy::byteorder::{LittleEndian, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

pub const FRAME_MAGIC: [u8; 2] = [b'%', b'D'];
pub const FRAME_VER: u8 = 1;

/// Payload larger than this is rejected as `RpcIntErr::Decode`
pub const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[repr(u8)]
pub enum FrameKind {
    /// First frame from the client, payload is [OpenReq]
    Open = 1,
    /// Payload is one encoded message
    Msg = 2,
    /// The sender half-closed its direction, empty payload
    Close = 3,
    /// Abrupt termination of the whole call, payload is a `WireError`
    Error = 4,
}

impl TryFrom<u8> for FrameKind {
    type Error = RpcIntErr;

    #[inline]
    fn try_from(v: u8) -> Result<Self, RpcIntErr> {
        match v {
            1 => Ok(Self::Open),
            2 => Ok(Self::Msg),
            3 => Ok(Self::Close),
            4 => Ok(Self::Error),
            _ => Err(RpcIntErr::Decode),
        }
    }
}

/// Frame header:
///
/// Fixed len of FrameHead = 16B, little endian
/// | 2B   |1B | 1B  | 8B  | 4B  |
/// | magic|ver| kind| seq | len |
///
/// `seq` is the ordinal of the frame in its direction, starting at 0.
#[derive(AsBytes, FromZeroes, FromBytes, Unaligned, PartialEq, Clone, Copy)]
#[repr(C)]
pub struct FrameHead {
    pub magic: [u8; 2],
    pub ver: u8,
    pub kind: u8,
    pub seq: U64<LittleEndian>,
    pub len: U32<LittleEndian>,
}

pub const FRAME_HEAD_LEN: usize = size_of::<FrameHead>();

/// Validated content of a [FrameHead]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadInfo {
    pub kind: FrameKind,
    pub seq: u64,
    pub len: u32,
}

impl FrameHead {
    #[inline]
    pub fn new(kind: FrameKind, seq: u64, len: u32) -> Self {
        Self {
            magic: FRAME_MAGIC,
            ver: FRAME_VER,
            kind: kind as u8,
            seq: U64::new(seq),
            len: U32::new(len),
        }
    }

    pub fn decode_head(head_buf: &[u8]) -> Result<HeadInfo, RpcIntErr> {
        let Some(head) = Self::read_from(head_buf) else {
            return Err(RpcIntErr::Decode);
        };
        if head.magic != FRAME_MAGIC {
            warn!("wrong magic receive {:?}", head.magic);
            return Err(RpcIntErr::Decode);
        }
        if head.ver != FRAME_VER {
            warn!("frame version {} not supported", head.ver);
            return Err(RpcIntErr::Version);
        }
        let kind = FrameKind::try_from(head.kind)?;
        let len = head.len.get();
        if len > MAX_FRAME_LEN {
            warn!("frame len {} exceeds limit", len);
            return Err(RpcIntErr::Decode);
        }
        if kind == FrameKind::Close && len > 0 {
            return Err(RpcIntErr::Decode);
        }
        Ok(HeadInfo { kind, seq: head.seq.get(), len })
    }
}

impl fmt::Display for FrameHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[kind:{}, seq:{}, len:{}]", self.kind, self.seq.get(), self.len.get())
    }
}

impl fmt::Debug for FrameHead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Payload of the `Open` frame
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OpenReq {
    pub op: String,
    pub shape: u8,
}
