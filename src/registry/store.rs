//! Stream registry implementation
//!
//! The central registry that owns every stream's history and listener set and
//! routes chunks from commentators to listeners.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::protocol::Outbox;

use super::chunk::{AudioChunk, StreamId};
use super::config::RegistryConfig;
use super::entry::{StreamEntry, StreamStats};

/// Central registry for all streams
///
/// The outer `RwLock` only guards lookup and lazy creation. Each stream has
/// its own `Mutex` around history and listeners together, so unrelated streams
/// never contend and, within one stream, a broadcast and a listener join are
/// each a single critical section.
pub struct StreamRegistry {
    /// Map of stream id to stream entry
    streams: RwLock<HashMap<StreamId, Arc<Mutex<StreamEntry>>>>,

    /// Configuration
    config: RegistryConfig,
}

impl StreamRegistry {
    /// Create a new stream registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new stream registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Look up a stream, creating an empty one on first reference
    ///
    /// Idempotent: an existing stream is returned untouched.
    pub async fn get_or_create(&self, id: &StreamId) -> Arc<Mutex<StreamEntry>> {
        if let Some(entry) = self.streams.read().await.get(id) {
            return Arc::clone(entry);
        }

        let mut streams = self.streams.write().await;
        let entry = streams.entry(id.clone()).or_insert_with(|| {
            tracing::info!(stream = %id, "Stream created");
            Arc::new(Mutex::new(StreamEntry::new(&self.config)))
        });
        Arc::clone(entry)
    }

    async fn get(&self, id: &StreamId) -> Option<Arc<Mutex<StreamEntry>>> {
        self.streams.read().await.get(id).map(Arc::clone)
    }

    /// Record a commentator announcement for a stream
    ///
    /// Creates the stream if needed. Any number of connections may announce
    /// the same stream; there is no exclusivity check.
    pub async fn announce_commentator(&self, id: &StreamId, session_id: u64) {
        let entry_arc = self.get_or_create(id).await;
        let mut entry = entry_arc.lock().await;
        entry.record_commentator();

        tracing::info!(
            stream = %id,
            session_id = session_id,
            buffered = entry.history().len(),
            listeners = entry.listener_count(),
            "Commentator announced"
        );
    }

    /// Append a chunk to a stream's history and fan it out to its listeners
    ///
    /// Returns the number of listeners the chunk was queued for. Listeners
    /// whose connection has already closed are skipped without error.
    pub async fn broadcast(&self, id: &StreamId, chunk: AudioChunk) -> usize {
        let entry_arc = self.get_or_create(id).await;
        let mut entry = entry_arc.lock().await;

        let game_time = chunk.game_time;
        let delivered = entry.append_and_fan_out(chunk);

        tracing::debug!(
            stream = %id,
            game_time = game_time,
            delivered = delivered,
            listeners = entry.listener_count(),
            "Chunk broadcast"
        );

        delivered
    }

    /// Register a listener and replay buffered chunks at or after `from_game_time`
    ///
    /// Registration and replay happen under the stream lock, so every chunk
    /// reaches the listener exactly once: either in the replay (if it was
    /// already buffered) or as a live broadcast (if it arrives afterwards).
    /// Returns the number of replayed chunks.
    pub async fn join_listener(
        &self,
        id: &StreamId,
        session_id: u64,
        from_game_time: u64,
        outbox: Outbox,
    ) -> usize {
        let entry_arc = self.get_or_create(id).await;
        let mut entry = entry_arc.lock().await;

        let replayed = entry.add_listener(session_id, outbox, from_game_time);

        tracing::info!(
            stream = %id,
            session_id = session_id,
            from_game_time = from_game_time,
            replayed = replayed,
            listeners = entry.listener_count(),
            "Listener joined"
        );

        replayed
    }

    /// Remove a listener from a stream
    ///
    /// Returns whether the listener was registered. Does not create the stream.
    pub async fn remove_listener(&self, id: &StreamId, session_id: u64) -> bool {
        let Some(entry_arc) = self.get(id).await else {
            return false;
        };
        let mut entry = entry_arc.lock().await;
        let removed = entry.remove_listener(session_id);

        tracing::debug!(
            stream = %id,
            session_id = session_id,
            removed = removed,
            listeners = entry.listener_count(),
            "Listener removed"
        );

        removed
    }

    /// Check if a stream has ever been referenced
    pub async fn stream_exists(&self, id: &StreamId) -> bool {
        self.streams.read().await.contains_key(id)
    }

    /// Get stream statistics without creating the stream
    pub async fn get_stream_stats(&self, id: &StreamId) -> Option<StreamStats> {
        let entry_arc = self.get(id).await?;
        let entry = entry_arc.lock().await;
        Some(entry.stats(id))
    }

    /// Copy of a stream's buffered history, in arrival order
    pub async fn history_snapshot(&self, id: &StreamId) -> Vec<AudioChunk> {
        let Some(entry_arc) = self.get(id).await else {
            return Vec::new();
        };
        let entry = entry_arc.lock().await;
        entry.history().iter().cloned().collect()
    }

    /// Get total number of streams
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}
