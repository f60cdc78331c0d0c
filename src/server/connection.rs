//! WebSocket connection driver
//!
//! Splits the socket into a reader loop, which feeds text frames to the
//! [`Session`] one at a time, and a writer task, which drains the session's
//! outbox onto the socket.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, OwnedSemaphorePermit};

use crate::error::Result;
use crate::protocol::ServerMessage;
use crate::registry::StreamRegistry;
use crate::session::Session;

/// One client connection
pub struct Connection {
    session_id: u64,
    peer_addr: SocketAddr,
    socket: WebSocket,
    registry: Arc<StreamRegistry>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl Connection {
    /// Wrap an upgraded socket
    pub fn new(
        session_id: u64,
        peer_addr: SocketAddr,
        socket: WebSocket,
        registry: Arc<StreamRegistry>,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        Self {
            session_id,
            peer_addr,
            socket,
            registry,
            _permit: permit,
        }
    }

    /// Serve the connection until the peer goes away
    ///
    /// Disconnect handling runs on every exit path, including transport
    /// errors, so a listener is always removed from its stream.
    pub async fn run(self) -> Result<()> {
        let (mut sink, mut stream) = self.socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
        let session_id = self.session_id;

        let writer = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let text = match message.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(session_id, error = %e, "Failed to encode message");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        let mut session = Session::new(self.session_id, self.peer_addr, self.registry, tx);

        let result: Result<()> = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => session.handle_text(text.as_str()).await,
                Some(Ok(Message::Binary(_))) => session.reject_frame(),
                Some(Ok(Message::Close(_))) | None => break Ok(()),
                // Ping/pong are answered by the WebSocket layer
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(e.into()),
            }
        };

        session.disconnect().await;

        tracing::debug!(
            session_id = self.session_id,
            peer = %self.peer_addr,
            role = session.state().role().name(),
            messages = session.state().messages_received,
            errors = session.state().errors_sent,
            duration_ms = session.state().duration().as_millis() as u64,
            "Connection finished"
        );

        drop(session);
        writer.abort();

        result
    }
}
