//! Wire envelopes and frame codecs.
//!
//! Every frame on the wire is a CBOR map `{protocol, data}` preceded by a
//! 4-byte big-endian length. The `protocol` field selects which registered
//! handler receives `data`.

use crate::error::{TransportError, TransportResult};
use statebus_state::{from_cbor, to_cbor, Value};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame length accepted on the wire.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// One multiplexed message: the protocol it belongs to and its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Name of the protocol the payload belongs to.
    pub protocol: String,
    /// The payload handed to the protocol handler.
    pub data: Value,
}

impl Envelope {
    /// Creates a new envelope.
    pub fn new(protocol: impl Into<String>, data: Value) -> Self {
        Self {
            protocol: protocol.into(),
            data,
        }
    }

    /// Encodes to CBOR bytes.
    pub fn encode(&self) -> TransportResult<Vec<u8>> {
        let value = Value::map(vec![
            ("protocol", Value::from(self.protocol.as_str())),
            ("data", self.data.clone()),
        ]);
        Ok(to_cbor(&value)?)
    }

    /// Decodes from CBOR bytes.
    pub fn decode(bytes: &[u8]) -> TransportResult<Self> {
        let value = from_cbor(bytes)?;
        let protocol = value
            .get("protocol")
            .and_then(Value::as_text)
            .ok_or_else(|| {
                TransportError::Codec(statebus_state::CodecError::invalid_structure(
                    "envelope missing protocol",
                ))
            })?
            .to_string();
        let data = value.get("data").cloned().unwrap_or(Value::Null);
        Ok(Self { protocol, data })
    }
}

/// Writes one length-prefixed envelope frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    envelope: &Envelope,
) -> TransportResult<()> {
    let body = envelope.encode()?;
    if body.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(body.len()));
    }

    writer.write_all(&(body.len() as u32).to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed envelope frame.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> TransportResult<Envelope> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;

    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Envelope::decode(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_roundtrip() {
        let envelope = Envelope::new("sync", Value::map(vec![("x", Value::Integer(1))]));
        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn envelope_missing_protocol_rejected() {
        let value = Value::map(vec![("data", Value::Null)]);
        let bytes = to_cbor(&value).unwrap();
        assert!(Envelope::decode(&bytes).is_err());
    }

    #[tokio::test]
    async fn frame_roundtrip() {
        let envelope = Envelope::new("rpc", Value::from("ping"));

        let mut buffer = Vec::new();
        write_frame(&mut buffer, &envelope).await.unwrap();

        let mut cursor = std::io::Cursor::new(buffer);
        let decoded = read_frame(&mut cursor).await.unwrap();
        assert_eq!(decoded, envelope);
    }

    #[tokio::test]
    async fn consecutive_frames() {
        let first = Envelope::new("a", Value::Integer(1));
        let second = Envelope::new("b", Value::Integer(2));

        let mut buffer = Vec::new();
        write_frame(&mut buffer, &first).await.unwrap();
        write_frame(&mut buffer, &second).await.unwrap();

        let mut cursor = std::io::Cursor::new(buffer);
        assert_eq!(read_frame(&mut cursor).await.unwrap(), first);
        assert_eq!(read_frame(&mut cursor).await.unwrap(), second);
    }

    #[tokio::test]
    async fn oversized_frame_rejected() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&(u32::MAX).to_be_bytes());
        buffer.extend_from_slice(&[0u8; 16]);

        let mut cursor = std::io::Cursor::new(buffer);
        assert!(matches!(
            read_frame(&mut cursor).await,
            Err(TransportError::FrameTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn truncated_frame_is_io_error() {
        let envelope = Envelope::new("sync", Value::Integer(1));
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &envelope).await.unwrap();
        buffer.truncate(buffer.len() - 1);

        let mut cursor = std::io::Cursor::new(buffer);
        assert!(matches!(
            read_frame(&mut cursor).await,
            Err(TransportError::Io(_))
        ));
    }
}
