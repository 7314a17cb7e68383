//! In-process loopback transport.
//!
//! [`conn_pair`] returns two connected byte-stream endpoints that behave
//! like the two ends of a socket: writes on one side are readable from the
//! other, in order. The `local_*` functions use the pair to drive a handler
//! directly, without sockets, for tests and for embedding the server in the
//! same process as the client.

use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};

use crate::blocks::Auth;
use crate::cancel::CancelToken;
use crate::content::Content;
use crate::error::Result;
use crate::handler::Handler;

/// Sentinel address reported by loopback endpoints, in host:port shape so
/// host splitting works the same as for a socket peer.
pub const LOOPBACK_ADDR: &str = "local:0";

/// In-memory buffer capacity per direction.
const LOOPBACK_BUFFER: usize = 64 * 1024;

/// One endpoint of an in-process connection pair.
pub struct LoopbackConn {
    stream: DuplexStream,
}

impl LoopbackConn {
    /// The peer's address sentinel.
    pub fn remote_addr(&self) -> &'static str {
        LOOPBACK_ADDR
    }
}

/// Create a connected pair of loopback endpoints.
pub fn conn_pair() -> (LoopbackConn, LoopbackConn) {
    let (client, server) = tokio::io::duplex(LOOPBACK_BUFFER);
    (
        LoopbackConn { stream: client },
        LoopbackConn { stream: server },
    )
}

impl AsyncRead for LoopbackConn {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for LoopbackConn {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

/// Host part of a `host:port` address string.
pub(crate) fn split_host(addr: &str) -> &str {
    match addr.rsplit_once(':') {
        Some((host, _port)) => host.trim_start_matches('[').trim_end_matches(']'),
        None => addr,
    }
}

/// Run one call's server side over a connected endpoint: read the request,
/// decode the method, invoke the handler. No middleware is involved.
pub async fn local_service<H: Handler>(conn: LoopbackConn, handler: &H) -> Result<()> {
    let remote_host = split_host(conn.remote_addr()).to_string();
    let (reader, writer) = tokio::io::split(conn);
    let mut content = Content::new(Box::new(reader), Box::new(writer));
    content.set_remote_host(remote_host);

    content.read_request().await?;
    content.bind_method()?;
    handler.call(&mut content).await
}

/// Drive a handler through the loopback with no blobs.
///
/// A handler error takes precedence over the client-side result.
pub async fn local_exec<P, R, H>(
    method: &str,
    params: &P,
    auth: Option<&Auth>,
    handler: H,
) -> Result<R>
where
    P: Serialize,
    R: DeserializeOwned,
    H: Handler,
{
    let (client_conn, server_conn) = conn_pair();
    let mut content = Content::from_stream(client_conn);
    content.create_request(method, params, auth)?;

    let client_side = async {
        content.write_request().await?;
        content.read_response().await
    };
    let (client_res, server_res) = tokio::join!(client_side, local_service(server_conn, &handler));
    server_res?;
    client_res?;
    content.bind_response()
}

/// Drive a handler through the loopback with a request blob.
pub async fn local_put<B, P, R, H>(
    cancel: &CancelToken,
    method: &str,
    reader: &mut B,
    bin_size: i64,
    params: &P,
    auth: Option<&Auth>,
    handler: H,
) -> Result<R>
where
    B: tokio::io::AsyncRead + Unpin + ?Sized,
    P: Serialize,
    R: DeserializeOwned,
    H: Handler,
{
    let (client_conn, server_conn) = conn_pair();
    let mut content = Content::from_stream(client_conn);
    content.set_req_bin_size(bin_size);
    content.create_request(method, params, auth)?;

    let client_side = async {
        content.write_request().await?;
        content.upload_bin(cancel, reader).await?;
        content.read_response().await
    };
    let (client_res, server_res) = tokio::join!(client_side, local_service(server_conn, &handler));
    server_res?;
    client_res?;
    content.bind_response()
}

/// Drive a handler through the loopback with a response blob streamed into
/// `writer`.
pub async fn local_get<W, P, R, H>(
    cancel: &CancelToken,
    method: &str,
    writer: &mut W,
    params: &P,
    auth: Option<&Auth>,
    handler: H,
) -> Result<R>
where
    W: tokio::io::AsyncWrite + Unpin + ?Sized,
    P: Serialize,
    R: DeserializeOwned,
    H: Handler,
{
    let (client_conn, server_conn) = conn_pair();
    let mut content = Content::from_stream(client_conn);
    content.create_request(method, params, auth)?;

    let client_side = async {
        content.write_request().await?;
        content.read_response().await?;
        content.download_bin(cancel, writer).await
    };
    let (client_res, server_res) = tokio::join!(client_side, local_service(server_conn, &handler));
    server_res?;
    client_res?;
    content.bind_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::copy::copy_bounded;
    use crate::error::{Result, RpcError};
    use crate::handler::BoxFuture;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Msg {
        message: String,
    }

    #[tokio::test]
    async fn test_pair_carries_bytes_both_ways() {
        let (mut a, mut b) = conn_pair();

        a.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        b.write_all(b"pong").await.unwrap();
        a.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn test_split_host() {
        assert_eq!(split_host("127.0.0.1:8081"), "127.0.0.1");
        assert_eq!(split_host("local:0"), "local");
        assert_eq!(split_host("[::1]:443"), "::1");
        assert_eq!(split_host("nohost"), "nohost");
    }

    fn hello_handler(content: &mut Content) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let params: Msg = content.bind_params()?;
            assert_eq!(params.message, "hello server!");
            assert_eq!(content.remote_host(), "local");

            let mut sink = tokio::io::sink();
            content.read_bin(&CancelToken::new(), &mut sink).await?;

            content
                .send_result(
                    &Msg {
                        message: "hello, client!".to_string(),
                    },
                    0,
                )
                .await
        })
    }

    fn save_handler(content: &mut Content) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let _params: Msg = content.bind_params()?;

            let mut buffer: Vec<u8> = Vec::new();
            content.read_bin(&CancelToken::new(), &mut buffer).await?;
            assert_eq!(buffer.len() as i64, content.bin_size());

            content
                .send_result(
                    &Msg {
                        message: "saved successfully!".to_string(),
                    },
                    0,
                )
                .await
        })
    }

    fn load_handler(content: &mut Content) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let _params: Msg = content.bind_params()?;

            let cancel = CancelToken::new();
            let mut sink = tokio::io::sink();
            content.read_bin(&cancel, &mut sink).await?;

            let bin_size: i64 = 1024;
            content
                .send_result(
                    &Msg {
                        message: "load successfully!".to_string(),
                    },
                    bin_size,
                )
                .await?;

            let payload = vec![0x5Au8; bin_size as usize];
            let mut source = &payload[..];
            copy_bounded(&cancel, &mut source, content.bin_writer(), bin_size).await?;
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_local_exec_hello() {
        let params = Msg {
            message: "hello server!".to_string(),
        };
        let result: Msg = local_exec("hello", &params, None, hello_handler)
            .await
            .unwrap();
        assert_eq!(result.message, "hello, client!");
    }

    #[tokio::test]
    async fn test_local_put_save() {
        let cancel = CancelToken::new();
        let params = Msg {
            message: "save data!".to_string(),
        };
        let blob = [0xA5u8; 16];
        let mut reader = &blob[..];

        let result: Msg = local_put(&cancel, "save", &mut reader, 16, &params, None, save_handler)
            .await
            .unwrap();
        assert_eq!(result.message, "saved successfully!");
    }

    #[tokio::test]
    async fn test_local_get_load() {
        let cancel = CancelToken::new();
        let params = Msg {
            message: "load data!".to_string(),
        };
        let mut sink: Vec<u8> = Vec::new();

        let result: Msg = local_get(&cancel, "load", &mut sink, &params, None, load_handler)
            .await
            .unwrap();
        assert_eq!(result.message, "load successfully!");
        assert_eq!(sink.len(), 1024);
        assert!(sink.iter().all(|&b| b == 0x5A));
    }

    #[tokio::test]
    async fn test_local_handler_error_takes_precedence() {
        fn failing(content: &mut Content) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move {
                content.send_error("handler failed").await?;
                Err(RpcError::Handler("handler failed".to_string()))
            })
        }

        let params = Msg {
            message: "x".to_string(),
        };
        let err = local_exec::<_, Msg, _>("any", &params, None, failing)
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Handler(_)));
    }
}
