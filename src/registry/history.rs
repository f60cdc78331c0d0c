//! Chunk history for late-joiner catch-up
//!
//! A listener joining a stream mid-match asks for everything from a given game
//! time onwards. The history keeps chunks in arrival order (not sorted by game
//! time, since a commentator may resend or rewind) and answers that query with
//! a linear scan.
//!
//! By default nothing is ever evicted. With limits configured, the oldest
//! chunks are dropped after each push until the history fits again.

use std::collections::VecDeque;

use super::chunk::AudioChunk;
use super::config::RegistryConfig;

/// Append-only, arrival-ordered chunk history
#[derive(Debug, Default)]
pub struct ChunkHistory {
    /// Buffered chunks, oldest first
    chunks: VecDeque<AudioChunk>,
    /// Sum of payload sizes currently buffered
    current_size: usize,
    /// Chunk count limit
    max_chunks: Option<usize>,
    /// Payload byte limit
    max_bytes: Option<usize>,
    /// Chunks dropped to stay within limits
    evicted: u64,
}

impl ChunkHistory {
    /// Create an unbounded history
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a history bounded by the registry configuration
    pub fn with_config(config: &RegistryConfig) -> Self {
        Self {
            max_chunks: config.max_history_chunks,
            max_bytes: config.max_history_bytes,
            ..Self::default()
        }
    }

    /// Append a chunk, evicting the oldest entries if a limit is exceeded
    ///
    /// A single chunk larger than the byte limit is still kept on its own; the
    /// newest chunk is never the one evicted.
    pub fn push(&mut self, chunk: AudioChunk) {
        self.current_size += chunk.size();
        self.chunks.push_back(chunk);

        while self.chunks.len() > 1 && self.over_limit() {
            if let Some(old) = self.chunks.pop_front() {
                self.current_size -= old.size();
                self.evicted += 1;
            }
        }
    }

    fn over_limit(&self) -> bool {
        let too_many = self.max_chunks.is_some_and(|max| self.chunks.len() > max);
        let too_big = self.max_bytes.is_some_and(|max| self.current_size > max);
        too_many || too_big
    }

    /// Chunks with `game_time >= from_game_time`, in arrival order
    pub fn since(&self, from_game_time: u64) -> impl Iterator<Item = &AudioChunk> + '_ {
        self.chunks
            .iter()
            .filter(move |chunk| chunk.game_time >= from_game_time)
    }

    /// All buffered chunks, in arrival order
    pub fn iter(&self) -> impl Iterator<Item = &AudioChunk> + '_ {
        self.chunks.iter()
    }

    /// Most recently appended chunk
    pub fn last(&self) -> Option<&AudioChunk> {
        self.chunks.back()
    }

    /// Number of buffered chunks
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total buffered payload size in bytes
    pub fn size(&self) -> usize {
        self.current_size
    }

    /// Number of chunks evicted so far
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
