//! Stream identifiers and audio chunks
//!
//! An [`AudioChunk`] is immutable once created. It is stored once in the
//! stream history and cloned into every listener's queue; the payload is a
//! reference-counted `Bytes`, so clones share the same allocation.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// Identifier of one commentary stream
///
/// Cheap to clone: the name is shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(Arc<str>);

impl StreamId {
    /// Create a stream id, rejecting the empty string
    pub fn new(id: impl AsRef<str>) -> Result<Self> {
        let id = id.as_ref();
        if id.is_empty() {
            return Err(Error::EmptyStreamId);
        }
        Ok(Self(Arc::from(id)))
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for StreamId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// One timestamped audio segment
///
/// Serializes to the body of an outbound `audio-chunk` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioChunk {
    /// Match-clock position in seconds, as supplied by the commentator
    pub game_time: u64,

    /// Raw audio bytes (base64 on the wire)
    #[serde(rename = "audio", serialize_with = "serialize_base64")]
    pub payload: Bytes,

    /// Wall-clock capture time in epoch milliseconds, informational only
    #[serde(rename = "timestamp")]
    pub captured_at: i64,
}

impl AudioChunk {
    /// Create a chunk from already-decoded audio
    pub fn new(game_time: u64, payload: Bytes, captured_at: i64) -> Self {
        Self {
            game_time,
            payload,
            captured_at,
        }
    }

    /// Create a chunk from a base64 `audio` field
    pub fn from_base64(game_time: u64, audio: &str, captured_at: i64) -> Result<Self> {
        let payload = STANDARD.decode(audio)?;
        Ok(Self::new(game_time, Bytes::from(payload), captured_at))
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

fn serialize_base64<S: Serializer>(
    payload: &Bytes,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_id_rejects_empty() {
        assert!(matches!(StreamId::new(""), Err(Error::EmptyStreamId)));

        let id = StreamId::new("m1").unwrap();
        assert_eq!(id.as_str(), "m1");
        assert_eq!(id.to_string(), "m1");
    }

    #[test]
    fn test_chunk_from_base64() {
        let chunk = AudioChunk::from_base64(10, "QQ==", 1000).unwrap();
        assert_eq!(chunk.game_time, 10);
        assert_eq!(&chunk.payload[..], b"A");
        assert_eq!(chunk.captured_at, 1000);
        assert_eq!(chunk.size(), 1);
    }

    #[test]
    fn test_chunk_rejects_invalid_base64() {
        let result = AudioChunk::from_base64(10, "not base64!", 1000);
        assert!(matches!(result, Err(Error::InvalidAudio(_))));
    }

    #[test]
    fn test_chunk_serializes_wire_fields() {
        let chunk = AudioChunk::from_base64(20, "Qg==", 2000).unwrap();
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "gameTime": 20, "audio": "Qg==", "timestamp": 2000 })
        );
    }
}
