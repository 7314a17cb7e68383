//! Wire format encoding and decoding.
//!
//! Implements the 32-byte header format:
//! ```text
//! ┌──────────┬──────────┬──────────┬──────────┐
//! │ Magic A  │ RPC size │ Bin size │ Magic B  │
//! │ 8 bytes  │ 8 bytes  │ 8 bytes  │ 8 bytes  │
//! │ int64 BE │ int64 BE │ int64 BE │ int64 BE │
//! └──────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! All four fields are Big Endian signed 64-bit integers. `rpc_size` is the
//! byte length of the structured payload that follows the header; `bin_size`
//! is the byte length of the binary blob that follows the payload. Both
//! magic markers are verified on decode; a mismatch is fatal to the
//! connection.

use crate::error::ProtocolError;

/// Header size in bytes (fixed, exactly 32).
pub const HEADER_SIZE: usize = 32;

/// First magic marker, at offset 0.
pub const MAGIC_CODE_A: i64 = 0xEE00ABBA;

/// Second magic marker, at offset 24.
pub const MAGIC_CODE_B: i64 = 0xEE44ABBA;

/// Maximum accepted structured-payload size (64 MiB).
///
/// The blob length is unbounded; only the codec-encoded payload, which is
/// buffered in memory before decoding, is capped.
pub const MAX_RPC_SIZE: i64 = 64 * 1024 * 1024;

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// First magic marker; must equal [`MAGIC_CODE_A`].
    pub magic_a: i64,
    /// Byte length of the structured payload following the header.
    pub rpc_size: i64,
    /// Byte length of the binary blob following the payload.
    pub bin_size: i64,
    /// Second magic marker; must equal [`MAGIC_CODE_B`].
    pub magic_b: i64,
}

impl Header {
    /// Create a header with both magics set and zero sizes.
    pub fn new() -> Self {
        Self {
            magic_a: MAGIC_CODE_A,
            rpc_size: 0,
            bin_size: 0,
            magic_b: MAGIC_CODE_B,
        }
    }

    /// Create a header with the given payload and blob sizes.
    pub fn with_sizes(rpc_size: i64, bin_size: i64) -> Self {
        Self {
            rpc_size,
            bin_size,
            ..Self::new()
        }
    }

    /// Encode the header to bytes (Big Endian).
    pub fn pack(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..8].copy_from_slice(&self.magic_a.to_be_bytes());
        buf[8..16].copy_from_slice(&self.rpc_size.to_be_bytes());
        buf[16..24].copy_from_slice(&self.bin_size.to_be_bytes());
        buf[24..32].copy_from_slice(&self.magic_b.to_be_bytes());
        buf
    }

    /// Decode a header from bytes (Big Endian) and validate it.
    ///
    /// # Errors
    ///
    /// * [`ProtocolError::ShortHeader`] if fewer than 32 bytes are given.
    /// * [`ProtocolError::MagicMismatch`] if either magic marker is wrong.
    /// * [`ProtocolError::BadSize`] if a size field is negative or the
    ///   payload size exceeds [`MAX_RPC_SIZE`].
    pub fn unpack(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < HEADER_SIZE {
            return Err(ProtocolError::ShortHeader(buf.len()));
        }
        let header = Self {
            magic_a: i64::from_be_bytes(buf[0..8].try_into().unwrap()),
            rpc_size: i64::from_be_bytes(buf[8..16].try_into().unwrap()),
            bin_size: i64::from_be_bytes(buf[16..24].try_into().unwrap()),
            magic_b: i64::from_be_bytes(buf[24..32].try_into().unwrap()),
        };
        header.validate()?;
        Ok(header)
    }

    /// Validate magics and size ranges.
    fn validate(&self) -> Result<(), ProtocolError> {
        if self.magic_a != MAGIC_CODE_A || self.magic_b != MAGIC_CODE_B {
            return Err(ProtocolError::MagicMismatch);
        }
        if self.rpc_size < 0 || self.rpc_size > MAX_RPC_SIZE {
            return Err(ProtocolError::BadSize(self.rpc_size));
        }
        if self.bin_size < 0 {
            return Err(ProtocolError::BadSize(self.bin_size));
        }
        Ok(())
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}
