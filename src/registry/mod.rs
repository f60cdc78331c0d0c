//! Stream registry for commentator → listener routing
//!
//! The registry owns every stream's state: the chunk history used for
//! catch-up and the set of listeners receiving live chunks. Streams are
//! created lazily on first reference and live for the life of the registry.
//!
//! # Architecture
//!
//! ```text
//!                       Arc<StreamRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ streams: HashMap<StreamId,   │
//!                 │   Mutex<StreamEntry {        │
//!                 │     history,                 │
//!                 │     listeners: {id → Outbox} │
//!                 │   }>                         │
//!                 │ >                            │
//!                 └──────────────┬───────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!  [Commentator]            [Listener]              [Listener]
//!  audio-chunk              outbox.recv()           outbox.recv()
//!        │                       │                       │
//!        └──► registry.broadcast()──► Outbox ──► writer task ──► WebSocket
//! ```
//!
//! # Join ordering
//!
//! `join_listener` registers the listener and replays matching history while
//! holding the stream lock, and `broadcast` appends and fans out under the
//! same lock. A chunk is therefore either already in the history when the
//! listener joins (and replayed) or arrives afterwards (and delivered live),
//! never both and never neither.

pub mod chunk;
pub mod config;
pub mod entry;
pub mod history;
pub mod store;

pub use chunk::{AudioChunk, StreamId};
pub use config::RegistryConfig;
pub use entry::{StreamEntry, StreamStats};
pub use history::ChunkHistory;
pub use store::StreamRegistry;
