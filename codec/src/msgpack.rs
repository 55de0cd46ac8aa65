use crate::Codec;
use serde::{Deserialize, Serialize};

/// MessagePack with named struct fields, so peers tolerate field reordering
#[derive(Default, Clone, Copy, Debug)]
pub struct MsgpCodec();

impl Codec for MsgpCodec {
    #[inline(always)]
    fn encode<T: Serialize>(&self, msg: &T) -> Result<Vec<u8>, ()> {
        match rmp_serde::encode::to_vec_named(msg) {
            Ok(buf) => return Ok(buf),
            Err(e) => {
                log::error!("encode error: {:?}", e);
                return Err(());
            }
        }
    }

    #[inline(always)]
    fn decode<'a, T: Deserialize<'a>>(&self, buf: &'a [u8]) -> Result<T, ()> {
        match rmp_serde::decode::from_slice::<T>(buf) {
            Err(e) => {
                log::warn!("decode error: {:?}", e);
                return Err(());
            }
            Ok(s) => return Ok(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_derive::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Greeting {
        name: String,
        times: i32,
    }

    #[derive(Deserialize, Debug)]
    struct Other {
        #[allow(dead_code)]
        number: i64,
    }

    #[test]
    fn test_msgp_struct() {
        let codec = MsgpCodec::default();
        let g = Greeting { name: "World".to_string(), times: 3 };
        let encoded = codec.encode(&g).expect("encode");
        let decoded: Greeting = codec.decode(&encoded).expect("decode");
        assert_eq!(decoded, g);
    }

    #[test]
    fn test_msgp_decode_mismatch() {
        let codec = MsgpCodec::default();
        let encoded = codec.encode(&Greeting { name: "x".to_string(), times: 1 }).unwrap();
        assert!(codec.decode::<Other>(&encoded).is_err());
        assert!(codec.decode::<Greeting>(&[0xc1]).is_err());
    }
}
