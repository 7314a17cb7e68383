//! Per-call context.
//!
//! A [`Content`] is created once per connection and owns everything one call
//! touches: the socket halves, the request and response headers, packets and
//! decoded heads, the peer's host, and the call start time. Handlers and
//! middleware receive `&mut Content`; the client state machines drive the
//! same struct from the other side of the wire.
//!
//! The blob channel is the socket itself: on the server the request blob is
//! read from the socket reader and the response blob is written to the
//! socket writer, strictly after the structured payload of the same leg.

use std::fmt;
use std::pin::pin;
use std::time::Instant;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::blocks::{Auth, EmptyResult, Request, RequestHead, Response, ResponseHead};
use crate::cancel::CancelToken;
use crate::codec::{Codec, WireCodec};
use crate::copy::copy_bounded;
use crate::error::{Result, RpcError};
use crate::protocol::{read_packet, write_packet, Header, Packet};

/// Boxed read half of a connection.
pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;

/// Boxed write half of a connection.
pub type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// State of one call on one connection.
pub struct Content {
    start: Instant,
    remote_host: String,

    sock_reader: BoxReader,
    sock_writer: BoxWriter,

    req_header: Header,
    req_packet: Packet,
    req_head: RequestHead,

    res_header: Header,
    res_packet: Packet,
    res_head: ResponseHead,

    response_sent: bool,
    bin_consumed: bool,
}

impl Content {
    /// Create a context over pre-split connection halves.
    pub fn new(reader: BoxReader, writer: BoxWriter) -> Self {
        Self {
            start: Instant::now(),
            remote_host: String::new(),
            sock_reader: reader,
            sock_writer: writer,
            req_header: Header::new(),
            req_packet: Packet::new(),
            req_head: RequestHead::default(),
            res_header: Header::new(),
            res_packet: Packet::new(),
            res_head: ResponseHead::default(),
            response_sent: false,
            bin_consumed: false,
        }
    }

    /// Create a context by splitting a connected stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        Self::new(Box::new(reader), Box::new(writer))
    }

    // ---- accessors ------------------------------------------------------

    /// The decoded method name; empty until the request head is bound.
    pub fn method(&self) -> &str {
        &self.req_head.method
    }

    /// When this call's context was created.
    pub fn start(&self) -> Instant {
        self.start
    }

    /// Host part of the peer's address.
    pub fn remote_host(&self) -> &str {
        &self.remote_host
    }

    pub(crate) fn set_remote_host(&mut self, host: String) {
        self.remote_host = host;
    }

    /// Request structured-payload size in bytes.
    pub fn req_rpc_size(&self) -> i64 {
        self.req_header.rpc_size
    }

    /// Request blob size in bytes.
    pub fn req_bin_size(&self) -> i64 {
        self.req_header.bin_size
    }

    /// Response structured-payload size in bytes.
    pub fn res_rpc_size(&self) -> i64 {
        self.res_header.rpc_size
    }

    /// Response blob size in bytes.
    pub fn res_bin_size(&self) -> i64 {
        self.res_header.bin_size
    }

    /// Total request size (payload plus blob).
    pub fn req_size(&self) -> i64 {
        self.req_header.rpc_size + self.req_header.bin_size
    }

    /// Total response size (payload plus blob).
    pub fn res_size(&self) -> i64 {
        self.res_header.rpc_size + self.res_header.bin_size
    }

    /// The response error string recorded on this context, if any.
    pub fn res_error(&self) -> &str {
        &self.res_head.error
    }

    // ---- auth -----------------------------------------------------------

    /// The request credentials, if the caller supplied any.
    pub fn auth(&self) -> Option<&Auth> {
        self.req_head.auth.as_ref()
    }

    /// Credential ident; empty when no auth was supplied.
    pub fn auth_ident(&self) -> &[u8] {
        self.req_head.auth.as_ref().map_or(&[], |a| &a.ident)
    }

    /// Credential salt; empty when no auth was supplied.
    pub fn auth_salt(&self) -> &[u8] {
        self.req_head.auth.as_ref().map_or(&[], |a| &a.salt)
    }

    /// Credential hash; empty when no auth was supplied.
    pub fn auth_hash(&self) -> &[u8] {
        self.req_head.auth.as_ref().map_or(&[], |a| &a.hash)
    }

    pub fn set_auth_ident(&mut self, ident: Vec<u8>) {
        self.req_head.auth.get_or_insert_with(Auth::default).ident = ident;
    }

    pub fn set_auth_salt(&mut self, salt: Vec<u8>) {
        self.req_head.auth.get_or_insert_with(Auth::default).salt = salt;
    }

    pub fn set_auth_hash(&mut self, hash: Vec<u8>) {
        self.req_head.auth.get_or_insert_with(Auth::default).hash = hash;
    }

    // ---- server side ----------------------------------------------------

    /// Read the request frame: header (verified) plus payload.
    pub(crate) async fn read_request(&mut self) -> Result<()> {
        let (header, payload) = read_packet(&mut self.sock_reader).await?;
        self.req_header = header;
        self.req_packet.header = header.pack().to_vec();
        self.req_packet.payload = payload;
        Ok(())
    }

    /// Phase-one decode: extract method and auth from the request payload.
    pub(crate) fn bind_method(&mut self) -> Result<()> {
        self.req_head = WireCodec::decode(&self.req_packet.payload)?;
        Ok(())
    }

    /// Phase-two decode: rebind the request payload's `params` into the
    /// handler's concrete type.
    pub fn bind_params<P: DeserializeOwned>(&self) -> Result<P> {
        let block: Request<P> = WireCodec::decode(&self.req_packet.payload)?;
        Ok(block.params)
    }

    /// Stream the request blob (exactly `req_bin_size` bytes) into `writer`.
    ///
    /// Callable at most once per call, and only before a response is sent.
    pub async fn read_bin<W>(&mut self, cancel: &CancelToken, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        if self.response_sent {
            return Err(RpcError::ResponseSent);
        }
        if self.bin_consumed {
            return Err(RpcError::BinConsumed);
        }
        self.bin_consumed = true;
        copy_bounded(cancel, &mut self.sock_reader, writer, self.req_header.bin_size).await?;
        Ok(())
    }

    /// Raw access to the socket reader, for handlers that drive the blob
    /// copy themselves.
    pub fn bin_reader(&mut self) -> &mut BoxReader {
        &mut self.sock_reader
    }

    /// Raw access to the socket writer. After [`Content::send_result`] with
    /// a non-zero `bin_size`, the handler must write exactly that many
    /// bytes here.
    pub fn bin_writer(&mut self) -> &mut BoxWriter {
        &mut self.sock_writer
    }

    /// The request blob size, for handlers using [`Content::bin_reader`].
    pub fn bin_size(&self) -> i64 {
        self.req_header.bin_size
    }

    /// Encode and send a success response (`error: ""`).
    ///
    /// `bin_size` is recorded in the response header; a non-zero value
    /// obliges the handler to follow up by writing exactly that many bytes
    /// to [`Content::bin_writer`].
    pub async fn send_result<R: Serialize>(&mut self, result: &R, bin_size: i64) -> Result<()> {
        if self.response_sent {
            return Err(RpcError::ResponseSent);
        }
        let block = Response {
            error: String::new(),
            result,
        };
        self.res_packet.payload = Bytes::from(WireCodec::encode(&block)?);
        self.res_header.rpc_size = self.res_packet.payload.len() as i64;
        self.res_header.bin_size = bin_size;
        self.res_packet.header = self.res_header.pack().to_vec();
        write_packet(&mut self.sock_writer, &self.res_packet).await?;
        self.response_sent = true;
        Ok(())
    }

    /// Encode and send a failure response carrying `err`'s display string.
    pub async fn send_error(&mut self, err: impl fmt::Display) -> Result<()> {
        if self.response_sent {
            return Err(RpcError::ResponseSent);
        }
        let block = Response {
            error: err.to_string(),
            result: EmptyResult {},
        };
        self.res_packet.payload = Bytes::from(WireCodec::encode(&block)?);
        self.res_header.rpc_size = self.res_packet.payload.len() as i64;
        self.res_header.bin_size = 0;
        self.res_packet.header = self.res_header.pack().to_vec();
        self.res_head.error = block.error;
        write_packet(&mut self.sock_writer, &self.res_packet).await?;
        self.response_sent = true;
        Ok(())
    }

    // ---- client side ----------------------------------------------------

    pub(crate) fn set_req_bin_size(&mut self, bin_size: i64) {
        self.req_header.bin_size = bin_size;
    }

    /// Encode the request block and compute the request header.
    pub(crate) fn create_request<P: Serialize>(
        &mut self,
        method: &str,
        params: &P,
        auth: Option<&Auth>,
    ) -> Result<()> {
        let block = Request::new(method, params, auth.cloned());
        self.req_packet.payload = Bytes::from(WireCodec::encode(&block)?);
        self.req_header.rpc_size = self.req_packet.payload.len() as i64;
        self.req_packet.header = self.req_header.pack().to_vec();
        self.req_head.method = block.method;
        self.req_head.auth = block.auth;
        Ok(())
    }

    /// Write the request frame to the socket.
    pub(crate) async fn write_request(&mut self) -> Result<()> {
        write_packet(&mut self.sock_writer, &self.req_packet).await
    }

    /// Stream the request blob from `reader` to the socket.
    pub(crate) async fn upload_bin<B>(&mut self, cancel: &CancelToken, reader: &mut B) -> Result<()>
    where
        B: AsyncRead + Unpin + ?Sized,
    {
        copy_bounded(cancel, reader, &mut self.sock_writer, self.req_header.bin_size).await?;
        self.sock_writer.flush().await?;
        Ok(())
    }

    /// Read the response frame: header (verified) plus payload.
    pub(crate) async fn read_response(&mut self) -> Result<()> {
        let (header, payload) = read_packet(&mut self.sock_reader).await?;
        self.res_header = header;
        self.res_packet.header = header.pack().to_vec();
        self.res_packet.payload = payload;
        Ok(())
    }

    /// Upload the request blob while concurrently reading the response
    /// frame from the same connection.
    ///
    /// The response read is the authoritative failure signal; upload
    /// failures surface as socket errors on the read side, except for
    /// cancellation, which aborts the call immediately.
    pub(crate) async fn put_round_trip<B>(
        &mut self,
        cancel: &CancelToken,
        reader: &mut B,
    ) -> Result<()>
    where
        B: AsyncRead + Unpin + ?Sized,
    {
        let bin_size = self.req_header.bin_size;
        let Self {
            sock_reader,
            sock_writer,
            res_header,
            res_packet,
            ..
        } = self;

        let mut read_fut = pin!(async {
            let (header, payload) = read_packet(sock_reader).await?;
            *res_header = header;
            res_packet.header = header.pack().to_vec();
            res_packet.payload = payload;
            Ok::<(), RpcError>(())
        });
        let mut upload_fut = pin!(async {
            copy_bounded(cancel, reader, sock_writer, bin_size).await?;
            sock_writer.flush().await?;
            Ok::<(), RpcError>(())
        });

        let mut upload_done = false;
        loop {
            tokio::select! {
                biased;
                read = &mut read_fut => {
                    read?;
                    return Ok(());
                }
                upload = &mut upload_fut, if !upload_done => {
                    upload_done = true;
                    match upload {
                        Err(RpcError::Cancelled) => return Err(RpcError::Cancelled),
                        Err(err) => {
                            // Write-side failures manifest on the read side.
                            tracing::debug!(error = %err, "request blob upload failed");
                        }
                        Ok(()) => {}
                    }
                }
            }
        }
    }

    /// Stream the response blob from the socket into `writer`.
    pub(crate) async fn download_bin<W>(
        &mut self,
        cancel: &CancelToken,
        writer: &mut W,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        copy_bounded(cancel, &mut self.sock_reader, writer, self.res_header.bin_size).await?;
        Ok(())
    }

    /// Decode the response payload and surface a remote failure.
    ///
    /// The error field is checked first so that an error response never
    /// fails to decode against the caller's result type.
    pub(crate) fn bind_response<R: DeserializeOwned>(&mut self) -> Result<R> {
        let head: ResponseHead = WireCodec::decode(&self.res_packet.payload)?;
        if !head.error.is_empty() {
            self.res_head = head;
            return Err(RpcError::Remote(self.res_head.error.clone()));
        }
        let block: Response<R> = WireCodec::decode(&self.res_packet.payload)?;
        self.res_head = head;
        Ok(block.result)
    }
}
