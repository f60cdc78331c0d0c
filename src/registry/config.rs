//! Registry configuration

/// Configuration for the stream registry
///
/// History is unbounded by default: every chunk a commentator submits is kept
/// for the life of the process. Setting either limit turns the history into a
/// sliding window that evicts the oldest chunks first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum number of chunks retained per stream (None = unbounded)
    pub max_history_chunks: Option<usize>,

    /// Maximum total payload bytes retained per stream (None = unbounded)
    pub max_history_bytes: Option<usize>,
}

impl RegistryConfig {
    /// Limit the number of chunks kept per stream
    pub fn max_history_chunks(mut self, max: usize) -> Self {
        self.max_history_chunks = Some(max);
        self
    }

    /// Limit the payload bytes kept per stream
    pub fn max_history_bytes(mut self, max: usize) -> Self {
        self.max_history_bytes = Some(max);
        self
    }

    /// Whether history grows without limit
    pub fn is_unbounded(&self) -> bool {
        self.max_history_chunks.is_none() && self.max_history_bytes.is_none()
    }
}
