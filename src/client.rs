//! Client operations: Exec, Put and Get.
//!
//! Three call shapes over one connection each:
//!
//! - [`exec`]: no blobs in either direction.
//! - [`put`]: a client-to-server blob, uploaded concurrently with the
//!   response read so a server that rejects early cannot deadlock the call.
//! - [`get`]: a server-to-client blob, streamed after the response payload
//!   (the blob length arrives in the response header) and before the result
//!   is bound.
//!
//! Each has a `conn_*` variant taking an already-connected stream (TCP,
//! TLS, loopback); the plain functions dial a TCP endpoint with a connect
//! timeout.

use std::io;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::blocks::Auth;
use crate::cancel::CancelToken;
use crate::content::Content;
use crate::error::{Result, RpcError};

/// TCP connect timeout applied by the dialing call variants.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

async fn dial(address: &str) -> Result<TcpStream> {
    let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
        .await
        .map_err(|_| {
            RpcError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect timeout: {address}"),
            ))
        })??;
    Ok(stream)
}

/// Call `method` with no blob in either direction.
pub async fn exec<P, R>(address: &str, method: &str, params: &P, auth: Option<&Auth>) -> Result<R>
where
    P: Serialize,
    R: DeserializeOwned,
{
    let stream = dial(address).await?;
    conn_exec(stream, method, params, auth).await
}

/// [`exec`] over an already-connected stream.
pub async fn conn_exec<S, P, R>(
    stream: S,
    method: &str,
    params: &P,
    auth: Option<&Auth>,
) -> Result<R>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    P: Serialize,
    R: DeserializeOwned,
{
    let mut content = Content::from_stream(stream);
    content.create_request(method, params, auth)?;
    content.write_request().await?;
    content.read_response().await?;
    content.bind_response()
}

/// Call `method`, uploading `bin_size` bytes from `reader` as the request
/// blob.
pub async fn put<B, P, R>(
    cancel: &CancelToken,
    address: &str,
    method: &str,
    reader: &mut B,
    bin_size: i64,
    params: &P,
    auth: Option<&Auth>,
) -> Result<R>
where
    B: AsyncRead + Unpin + ?Sized,
    P: Serialize,
    R: DeserializeOwned,
{
    let stream = dial(address).await?;
    conn_put(cancel, stream, method, reader, bin_size, params, auth).await
}

/// [`put`] over an already-connected stream.
///
/// The blob upload and the response read run concurrently on the two
/// directions of the connection: the server may answer before it has
/// drained the whole blob. The response read is the authoritative failure
/// signal; only a fired cancellation token aborts the call from the upload
/// side.
pub async fn conn_put<S, B, P, R>(
    cancel: &CancelToken,
    stream: S,
    method: &str,
    reader: &mut B,
    bin_size: i64,
    params: &P,
    auth: Option<&Auth>,
) -> Result<R>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    B: AsyncRead + Unpin + ?Sized,
    P: Serialize,
    R: DeserializeOwned,
{
    let mut content = Content::from_stream(stream);
    content.set_req_bin_size(bin_size);
    content.create_request(method, params, auth)?;
    content.write_request().await?;
    content.put_round_trip(cancel, reader).await?;
    content.bind_response()
}

/// Call `method`, streaming the response blob into `writer`.
pub async fn get<W, P, R>(
    cancel: &CancelToken,
    address: &str,
    method: &str,
    writer: &mut W,
    params: &P,
    auth: Option<&Auth>,
) -> Result<R>
where
    W: AsyncWrite + Unpin + ?Sized,
    P: Serialize,
    R: DeserializeOwned,
{
    let stream = dial(address).await?;
    conn_get(cancel, stream, method, writer, params, auth).await
}

/// [`get`] over an already-connected stream.
pub async fn conn_get<S, W, P, R>(
    cancel: &CancelToken,
    stream: S,
    method: &str,
    writer: &mut W,
    params: &P,
    auth: Option<&Auth>,
) -> Result<R>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    W: AsyncWrite + Unpin + ?Sized,
    P: Serialize,
    R: DeserializeOwned,
{
    let mut content = Content::from_stream(stream);
    content.create_request(method, params, auth)?;
    content.write_request().await?;
    content.read_response().await?;
    content.download_bin(cancel, writer).await?;
    content.bind_response()
}
