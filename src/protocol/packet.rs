//! Packet container and framed I/O helpers.
//!
//! A [`Packet`] pairs the raw header bytes with the raw structured payload
//! bytes of one frame. The helpers read and write a whole frame with strict
//! sizes: exactly 32 header bytes, exactly `rpc_size` payload bytes. The
//! copier handles the blob that may follow; nothing here reads past the
//! payload, which matters because the same stream carries the rest of the
//! call.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::wire_format::{Header, HEADER_SIZE};
use crate::error::Result;

/// Raw bytes of one frame: header and structured payload.
#[derive(Debug, Clone, Default)]
pub struct Packet {
    /// Encoded header bytes (32 once populated).
    pub header: Vec<u8>,
    /// Codec-encoded payload bytes (`rpc_size` long).
    pub payload: Bytes,
}

impl Packet {
    /// Create an empty packet.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Read one frame: header (verified) plus payload.
pub async fn read_packet<R>(reader: &mut R) -> Result<(Header, Bytes)>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut head = [0u8; HEADER_SIZE];
    reader.read_exact(&mut head).await?;
    let header = Header::unpack(&head)?;

    let mut payload = vec![0u8; header.rpc_size as usize];
    reader.read_exact(&mut payload).await?;
    Ok((header, Bytes::from(payload)))
}

/// Write one frame: header bytes then payload bytes, flushed.
pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(&packet.header).await?;
    writer.write_all(&packet.payload).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProtocolError, RpcError};

    fn frame(rpc_size: i64, payload: &[u8]) -> Packet {
        Packet {
            header: Header::with_sizes(rpc_size, 0).pack().to_vec(),
            payload: Bytes::copy_from_slice(payload),
        }
    }

    #[tokio::test]
    async fn test_write_read_roundtrip() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let packet = frame(5, b"hello");

        write_packet(&mut client, &packet).await.unwrap();
        let (header, payload) = read_packet(&mut server).await.unwrap();

        assert_eq!(header.rpc_size, 5);
        assert_eq!(payload.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn test_read_empty_payload() {
        let (mut client, mut server) = tokio::io::duplex(64);
        write_packet(&mut client, &frame(0, b"")).await.unwrap();

        let (header, payload) = read_packet(&mut server).await.unwrap();
        assert_eq!(header.rpc_size, 0);
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_read_corrupt_magic_is_protocol_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let mut bytes = Header::new().pack();
        bytes[0..8].copy_from_slice(&0i64.to_be_bytes());
        client.write_all(&bytes).await.unwrap();

        let err = read_packet(&mut server).await.unwrap_err();
        assert!(matches!(
            err,
            RpcError::Protocol(ProtocolError::MagicMismatch)
        ));
    }

    #[tokio::test]
    async fn test_read_truncated_header_is_io_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&[0u8; 10]).await.unwrap();
        drop(client);

        let err = read_packet(&mut server).await.unwrap_err();
        assert!(matches!(err, RpcError::Io(_)));
    }

    #[tokio::test]
    async fn test_read_truncated_payload_is_io_error() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let packet = Packet {
            header: Header::with_sizes(10, 0).pack().to_vec(),
            payload: Bytes::from_static(b"abc"), // shorter than promised
        };
        write_packet(&mut client, &packet).await.unwrap();
        drop(client);

        let err = read_packet(&mut server).await.unwrap_err();
        assert!(matches!(err, RpcError::Io(_)));
    }
}
