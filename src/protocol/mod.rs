//! Relay wire protocol
//!
//! JSON records exchanged over WebSocket text frames, plus the validated
//! [`Command`] form the session handler acts on.

pub mod message;

pub use message::{BoundRole, ClientMessage, Command, Outbox, ServerMessage};
