//! Error types for blobrpc.

use thiserror::Error;

/// Main error type for all blobrpc operations.
#[derive(Debug, Error)]
pub enum RpcError {
    /// I/O error during socket operations (read, write, accept, dial).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire framing violation; fatal to the connection.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Payload encode or decode failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Error reported by a handler or middleware.
    #[error("handler error: {0}")]
    Handler(String),

    /// Client-side: the response's `error` field was non-empty.
    /// The message is carried verbatim from the remote handler.
    #[error("remote error: {0}")]
    Remote(String),

    /// Cancellation token fired during a blob copy.
    #[error("copy cancelled")]
    Cancelled,

    /// The destination accepted zero bytes mid-copy.
    #[error("short write during copy")]
    ShortWrite,

    /// A response was already sent on this call.
    #[error("response already sent")]
    ResponseSent,

    /// The request blob was already consumed on this call.
    #[error("request blob already consumed")]
    BinConsumed,

    /// Address resolution or listener setup failure.
    #[error("config error: {0}")]
    Config(String),
}

/// Framing violations detected while decoding a header.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// One of the two magic markers did not match.
    #[error("wrong protocol magic code")]
    MagicMismatch,

    /// A size field was negative, or the structured payload exceeds the cap.
    #[error("bad frame size: {0}")]
    BadSize(i64),

    /// Fewer than 32 header bytes were available.
    #[error("short header: {0} bytes")]
    ShortHeader(usize),
}

/// Structured-payload encode/decode failures, per codec.
#[derive(Debug, Error)]
pub enum CodecError {
    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("msgpack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("msgpack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
}

/// Result type alias using RpcError.
pub type Result<T> = std::result::Result<T, RpcError>;
