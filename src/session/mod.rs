//! Per-connection session handling
//!
//! - [`state`]: the unbound → commentator/listener role state machine
//! - [`handler`]: dispatches decoded messages against the registry

pub mod handler;
pub mod state;

pub use handler::Session;
pub use state::{Role, SessionState};
