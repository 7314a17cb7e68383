//! MsgPack codec using `rmp-serde`.
//!
//! Uses `to_vec_named` so structs travel as maps (with field names) rather
//! than positional arrays. The map format is what lets a block be decoded
//! twice into different struct shapes: fields absent from the destination
//! are skipped by name.

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Codec;
use crate::error::CodecError;

/// Self-describing binary codec for structured payloads.
pub struct MsgPackCodec;

impl Codec for MsgPackCodec {
    #[inline]
    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
        // to_vec_named, not to_vec: struct-as-map is required for the
        // two-phase decode.
        Ok(rmp_serde::to_vec_named(value)?)
    }

    #[inline]
    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}
