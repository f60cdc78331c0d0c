//! Connection role state machine
//!
//! Tracks which role a connection is bound to. A connection starts unbound
//! and binds exactly once, to either a commentator or a listener role, which
//! it keeps until it disconnects.

use std::net::SocketAddr;
use std::time::Instant;

use crate::protocol::BoundRole;
use crate::registry::StreamId;

/// Role of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Connected, no valid control message yet
    Unbound,
    /// Submits chunks for the stream
    Commentator(StreamId),
    /// Receives chunks from the stream
    Listener(StreamId),
}

impl Role {
    /// Role name used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Role::Unbound => "unbound",
            Role::Commentator(_) => BoundRole::Commentator.as_str(),
            Role::Listener(_) => BoundRole::Listener.as_str(),
        }
    }

    /// Stream this role is bound to
    pub fn stream_id(&self) -> Option<&StreamId> {
        match self {
            Role::Unbound => None,
            Role::Commentator(id) | Role::Listener(id) => Some(id),
        }
    }
}

/// Complete connection state
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Current role
    role: Role,

    /// Connection start time
    pub connected_at: Instant,

    /// Time when the role was bound
    pub bound_at: Option<Instant>,

    /// Inbound messages processed
    pub messages_received: u64,

    /// Chunks submitted (commentator only)
    pub chunks_submitted: u64,

    /// Error replies sent
    pub errors_sent: u64,
}

impl SessionState {
    /// Create a new, unbound session state
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            role: Role::Unbound,
            connected_at: Instant::now(),
            bound_at: None,
            messages_received: 0,
            chunks_submitted: 0,
            errors_sent: 0,
        }
    }

    /// Current role
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Check if a role has been bound
    pub fn is_bound(&self) -> bool {
        self.role != Role::Unbound
    }

    /// Bind as commentator; ignored unless currently unbound
    pub fn bind_commentator(&mut self, stream_id: StreamId) {
        self.bind(Role::Commentator(stream_id));
    }

    /// Bind as listener; ignored unless currently unbound
    pub fn bind_listener(&mut self, stream_id: StreamId) {
        self.bind(Role::Listener(stream_id));
    }

    fn bind(&mut self, role: Role) {
        if self.role == Role::Unbound {
            self.role = role;
            self.bound_at = Some(Instant::now());
        }
    }

    /// Get session duration
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}
