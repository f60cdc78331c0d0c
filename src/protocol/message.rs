//! Relay wire messages
//!
//! Every WebSocket text frame carries one JSON record tagged by `type`:
//!
//! | Direction | type | fields |
//! |-----------|------|--------|
//! | client → server | `start-commentator` | `streamId` |
//! | client → server | `audio-chunk` | `streamId` (ignored), `gameTime`, `audio`, `timestamp` |
//! | client → server | `start-listener` | `streamId`, `gameTime` |
//! | server → client | `ack` | `role` |
//! | server → client | `audio-chunk` | `gameTime`, `audio`, `timestamp` |
//! | server → client | `error` | `message` |

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::registry::{AudioChunk, StreamId};

/// Per-connection outbound queue
///
/// Everything the relay sends to a client goes through this channel, so the
/// order of `send` calls is the order the client observes.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Role a connection can bind to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundRole {
    /// Sole submitter of chunks for a stream
    Commentator,
    /// Receive-only consumer of a stream
    Listener,
}

impl BoundRole {
    /// Role name as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundRole::Commentator => "commentator",
            BoundRole::Listener => "listener",
        }
    }
}

/// Message received from a client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Bind this connection as the commentator of a stream
    #[serde(rename_all = "camelCase")]
    StartCommentator {
        /// Stream to announce
        stream_id: String,
    },

    /// Submit one chunk on the bound stream
    #[serde(rename_all = "camelCase")]
    AudioChunk {
        /// Informational; chunks always go to the bound stream
        #[serde(default)]
        stream_id: Option<String>,
        /// Match-clock seconds
        game_time: u64,
        /// Base64 audio payload
        audio: String,
        /// Capture time in epoch milliseconds
        timestamp: i64,
    },

    /// Join a stream as a listener, catching up from `game_time`
    #[serde(rename_all = "camelCase")]
    StartListener {
        /// Stream to join
        stream_id: String,
        /// First game time to replay
        game_time: u64,
    },
}

impl ClientMessage {
    /// Decode one text frame
    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Wire name of this message type
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::StartCommentator { .. } => "start-commentator",
            ClientMessage::AudioChunk { .. } => "audio-chunk",
            ClientMessage::StartListener { .. } => "start-listener",
        }
    }
}

/// Control message with a validated stream id
///
/// Produced from a decoded [`ClientMessage`]; this is what the session acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Announce as commentator
    StartCommentator(StreamId),
    /// Submit a chunk
    Submit(AudioChunk),
    /// Join as listener from a game time
    StartListener(StreamId, u64),
}

impl TryFrom<ClientMessage> for Command {
    type Error = crate::error::Error;

    fn try_from(message: ClientMessage) -> Result<Self> {
        match message {
            ClientMessage::StartCommentator { stream_id } => {
                Ok(Command::StartCommentator(StreamId::new(stream_id)?))
            }
            ClientMessage::AudioChunk {
                game_time,
                audio,
                timestamp,
                ..
            } => Ok(Command::Submit(AudioChunk::from_base64(
                game_time, &audio, timestamp,
            )?)),
            ClientMessage::StartListener {
                stream_id,
                game_time,
            } => Ok(Command::StartListener(StreamId::new(stream_id)?, game_time)),
        }
    }
}

/// Message sent to a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Role binding succeeded
    Ack {
        /// The bound role
        role: BoundRole,
    },

    /// One chunk, replayed or live
    AudioChunk(AudioChunk),

    /// The last inbound message was rejected
    Error {
        /// Human-readable reason
        message: String,
    },
}

impl ServerMessage {
    /// Build an error reply
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Encode as a JSON text frame
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
