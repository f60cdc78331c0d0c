//! Stream entry and statistics types
//!
//! This module defines the per-stream state stored in the registry: the chunk
//! history and the set of connected listeners. Both live behind one lock in
//! the registry, so appending and replaying can never interleave.

use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;

use crate::protocol::{Outbox, ServerMessage};

use super::chunk::{AudioChunk, StreamId};
use super::config::RegistryConfig;
use super::history::ChunkHistory;

/// Entry for a single stream in the registry
#[derive(Debug)]
pub struct StreamEntry {
    /// Arrival-ordered chunk history for catch-up
    history: ChunkHistory,

    /// Outbound queues of registered listeners, keyed by session ID
    listeners: HashMap<u64, Outbox>,

    /// How many times a commentator has announced this stream
    commentator_announcements: u64,

    /// Chunks accepted since creation, including evicted ones
    chunks_received: u64,

    /// When the stream was created
    created_at: Instant,

    /// When the most recent chunk arrived
    last_chunk_at: Option<Instant>,
}

impl StreamEntry {
    /// Create a new, empty stream entry
    pub(super) fn new(config: &RegistryConfig) -> Self {
        Self {
            history: ChunkHistory::with_config(config),
            listeners: HashMap::new(),
            commentator_announcements: 0,
            chunks_received: 0,
            created_at: Instant::now(),
            last_chunk_at: None,
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Whether a session is registered as a listener
    pub fn has_listener(&self, session_id: u64) -> bool {
        self.listeners.contains_key(&session_id)
    }

    /// Buffered history
    pub fn history(&self) -> &ChunkHistory {
        &self.history
    }

    pub(super) fn record_commentator(&mut self) {
        self.commentator_announcements += 1;
    }

    /// Append a chunk and fan it out to every registered listener
    ///
    /// Returns the number of listeners whose queue accepted the chunk. A queue
    /// whose connection already went away is skipped; it stays registered
    /// until the disconnect is reported.
    pub(super) fn append_and_fan_out(&mut self, chunk: AudioChunk) -> usize {
        self.chunks_received += 1;
        self.last_chunk_at = Some(Instant::now());
        self.history.push(chunk.clone());

        let mut delivered = 0;
        for (session_id, outbox) in &self.listeners {
            match outbox.send(ServerMessage::AudioChunk(chunk.clone())) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::trace!(session_id = session_id, "Skipping closed listener");
                }
            }
        }

        delivered
    }

    /// Register a listener and replay buffered chunks from `from_game_time`
    ///
    /// Returns the number of chunks replayed.
    pub(super) fn add_listener(
        &mut self,
        session_id: u64,
        outbox: Outbox,
        from_game_time: u64,
    ) -> usize {
        let mut replayed = 0;
        for chunk in self.history.since(from_game_time) {
            if outbox.send(ServerMessage::AudioChunk(chunk.clone())).is_err() {
                break;
            }
            replayed += 1;
        }

        self.listeners.insert(session_id, outbox);
        replayed
    }

    /// Remove a listener, returning whether it was registered
    pub(super) fn remove_listener(&mut self, session_id: u64) -> bool {
        self.listeners.remove(&session_id).is_some()
    }

    /// Snapshot statistics for this stream
    pub fn stats(&self, stream_id: &StreamId) -> StreamStats {
        StreamStats {
            stream_id: stream_id.clone(),
            chunks: self.history.len(),
            history_bytes: self.history.size(),
            evicted_chunks: self.history.evicted(),
            listeners: self.listeners.len(),
            chunks_received: self.chunks_received,
            last_game_time: self.history.last().map(|c| c.game_time),
            commentator_announcements: self.commentator_announcements,
            age_secs: self.created_at.elapsed().as_secs(),
            idle_secs: self.last_chunk_at.map(|t| t.elapsed().as_secs()),
        }
    }
}

/// Statistics for a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStats {
    /// Stream identifier
    pub stream_id: StreamId,
    /// Number of chunks currently buffered
    pub chunks: usize,
    /// Buffered payload size in bytes
    pub history_bytes: usize,
    /// Chunks dropped by the history limit
    pub evicted_chunks: u64,
    /// Number of registered listeners
    pub listeners: usize,
    /// Chunks accepted since creation
    pub chunks_received: u64,
    /// Game time of the most recent chunk
    pub last_game_time: Option<u64>,
    /// Number of commentator announcements
    pub commentator_announcements: u64,
    /// Seconds since the stream was first referenced
    pub age_secs: u64,
    /// Seconds since the last chunk, if any arrived
    pub idle_secs: Option<u64>,
}
