//! Cancellable, size-bounded stream copy.
//!
//! Moves exactly `size` bytes from a reader to a writer in chunks of at
//! most 16 KiB, racing every read and write against a cancellation token.
//! The copier never reads past `size`: the same stream carries the rest of
//! the call after the blob.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::cancel::CancelToken;
use crate::error::{Result, RpcError};

/// Chunk size for bounded copies (16 KiB).
pub const COPY_CHUNK_SIZE: usize = 16 * 1024;

/// Copy exactly `size` bytes from `reader` to `writer`.
///
/// Returns the number of bytes copied, which equals `size` on success.
/// A `size` of zero (or less) returns immediately with zero.
///
/// # Errors
///
/// * [`RpcError::Cancelled`] if the token fires; the copy aborts within one
///   chunk, even while blocked on a read or write.
/// * [`RpcError::Io`] with `UnexpectedEof` if the reader runs dry before
///   `size` bytes, or on any underlying read/write failure.
/// * [`RpcError::ShortWrite`] if the writer stops accepting bytes.
pub async fn copy_bounded<R, W>(
    cancel: &CancelToken,
    reader: &mut R,
    writer: &mut W,
    size: i64,
) -> Result<i64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut total: i64 = 0;
    let mut remains = size;
    if remains <= 0 {
        return Ok(total);
    }

    let mut buffer = vec![0u8; COPY_CHUNK_SIZE];
    while remains > 0 {
        if cancel.is_cancelled() {
            return Err(RpcError::Cancelled);
        }

        let want = remains.min(COPY_CHUNK_SIZE as i64) as usize;
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RpcError::Cancelled),
            read = reader.read(&mut buffer[..want]) => read?,
        };
        if received == 0 {
            return Err(RpcError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short read: {} of {} bytes", total, size),
            )));
        }

        let mut written = 0;
        while written < received {
            let wrote = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RpcError::Cancelled),
                wrote = writer.write(&buffer[written..received]) => wrote?,
            };
            if wrote == 0 {
                return Err(RpcError::ShortWrite);
            }
            written += wrote;
        }

        total += received as i64;
        remains -= received as i64;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_copies_exact_size() {
        let cancel = CancelToken::new();
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let mut reader = &data[..];
        let mut sink: Vec<u8> = Vec::new();

        let copied = copy_bounded(&cancel, &mut reader, &mut sink, data.len() as i64)
            .await
            .unwrap();

        assert_eq!(copied, data.len() as i64);
        assert_eq!(sink, data);
    }

    #[tokio::test]
    async fn test_does_not_read_past_size() {
        let cancel = CancelToken::new();
        let data = b"0123456789abcdef".to_vec();
        let mut reader = &data[..];
        let mut sink: Vec<u8> = Vec::new();

        let copied = copy_bounded(&cancel, &mut reader, &mut sink, 10).await.unwrap();

        assert_eq!(copied, 10);
        assert_eq!(sink, b"0123456789");
        // The remaining bytes must still be in the reader.
        assert_eq!(reader, &b"abcdef"[..]);
    }

    #[tokio::test]
    async fn test_zero_size_returns_immediately() {
        let cancel = CancelToken::new();
        let mut reader = tokio::io::repeat(0xAB);
        let mut sink: Vec<u8> = Vec::new();

        let copied = copy_bounded(&cancel, &mut reader, &mut sink, 0).await.unwrap();
        assert_eq!(copied, 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut reader = tokio::io::repeat(0xAB);
        let mut sink: Vec<u8> = Vec::new();

        let err = copy_bounded(&cancel, &mut reader, &mut sink, 1024)
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Cancelled));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_short_read_is_unexpected_eof() {
        let cancel = CancelToken::new();
        let data = b"only ten b".to_vec();
        let mut reader = &data[..];
        let mut sink: Vec<u8> = Vec::new();

        let err = copy_bounded(&cancel, &mut reader, &mut sink, 1024)
            .await
            .unwrap_err();
        match err {
            RpcError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_aborts_blocked_write() {
        let cancel = CancelToken::new();
        // Tiny pipe that nobody drains: the copy stalls on write.
        let (mut tx, _rx) = tokio::io::duplex(1024);
        let mut reader = tokio::io::repeat(0xCD);

        cancel.cancel_after(Duration::from_millis(20));
        let err = tokio::time::timeout(
            Duration::from_secs(5),
            copy_bounded(&cancel, &mut reader, &mut tx, 100 * 1024 * 1024),
        )
        .await
        .expect("copy must abort promptly")
        .unwrap_err();

        assert!(matches!(err, RpcError::Cancelled));
    }
}
