//! Codec module - serialization/deserialization for structured payloads.
//!
//! Two codecs encode the Request/Response blocks:
//!
//! - [`JsonCodec`] - text encoding using `serde_json` (the default)
//! - [`MsgPackCodec`] - self-describing binary using `rmp-serde`
//!
//! # Design
//!
//! Codecs are marker structs implementing [`Codec`] through associated
//! functions rather than trait objects, so the codec is selected at compile
//! time. The [`WireCodec`] alias names the selected codec: JSON unless the
//! `codec-msgpack` cargo feature is enabled. Client and server must agree on
//! the selection.
//!
//! Both codecs tolerate unknown fields when decoding, which is what makes
//! the two-phase decode of request and response blocks work: the same bytes
//! are decoded once into a head struct (method, auth, error) and a second
//! time into the caller's concrete block type.

mod json;
mod msgpack;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecError;

/// Encoding/decoding contract for structured payloads.
pub trait Codec {
    /// Encode a block to payload bytes.
    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode payload bytes into a block.
    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError>;
}

/// The codec compiled into this build.
#[cfg(feature = "codec-msgpack")]
pub type WireCodec = MsgPackCodec;

/// The codec compiled into this build.
#[cfg(not(feature = "codec-msgpack"))]
pub type WireCodec = JsonCodec;
