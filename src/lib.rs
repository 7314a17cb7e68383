//! # blobrpc
//!
//! A compact request/response RPC framework with a dual-channel wire
//! format: every call carries a codec-encoded structured payload AND an
//! opaque variable-length binary blob on the same connection, in both
//! directions. Built for file-transfer-style services where metadata
//! (method, params, credentials, status) travels alongside bulk content
//! without a second connection or multipart re-encoding.
//!
//! ## Architecture
//!
//! - **Framing**: a fixed 32-byte header (two magic markers, payload size,
//!   blob size) precedes each payload; the blob follows the payload.
//! - **Calls**: each connection carries exactly one call. `exec` exchanges
//!   no blobs, `put` uploads one, `get` downloads one. The `put` upload
//!   overlaps with the response read so an early server rejection cannot
//!   deadlock the client.
//! - **Server**: one task per accepted connection, pre/post middleware
//!   around a method route table, cancellation-driven shutdown that drains
//!   in-flight calls.
//! - **Loopback**: an in-process connection pair drives handlers without a
//!   socket.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use blobrpc::{BoxFuture, Content, Result, Service};
//!
//! fn hello(content: &mut Content) -> BoxFuture<'_, Result<()>> {
//!     Box::pin(async move {
//!         let params: HelloParams = content.bind_params()?;
//!         content.send_result(&HelloResult { message: "hi".into() }, 0).await
//!     })
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut service = Service::new();
//!     service.handle("hello", hello);
//!     Arc::new(service).listen("127.0.0.1:8081").await
//! }
//! ```

pub mod auth;
pub mod blocks;
pub mod cancel;
pub mod client;
pub mod codec;
pub mod content;
pub mod copy;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod protocol;
pub mod server;
pub mod transport;

pub use auth::{check_hash, create_auth};
pub use blocks::{Auth, EmptyParams, EmptyResult, Request, RequestHead, Response, ResponseHead};
pub use cancel::CancelToken;
pub use client::{conn_exec, conn_get, conn_put, exec, get, put, CONNECT_TIMEOUT};
pub use codec::{Codec, JsonCodec, MsgPackCodec, WireCodec};
pub use content::{BoxReader, BoxWriter, Content};
pub use copy::{copy_bounded, COPY_CHUNK_SIZE};
pub use error::{CodecError, ProtocolError, Result, RpcError};
pub use handler::{BoxFuture, Handler};
pub use server::Service;
pub use transport::{conn_pair, local_exec, local_get, local_put, local_service, LoopbackConn};
