use serde::{Deserialize, Serialize};

/// Message serialization used by both ends of a call.
///
/// Implementations live in `duplex-rpc-codec`. The codec is shared by reference between
/// the endpoints and the frame writer of a connection, so it must be immutable.
pub trait Codec: Default + Send + Sync + Sized + 'static {
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, ()>;

    fn decode<'a, T: Deserialize<'a>>(&self, buf: &'a [u8]) -> Result<T, ()>;
}
