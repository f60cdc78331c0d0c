//! Connection role handler
//!
//! [`Session`] processes one inbound message at a time for one connection and
//! performs exactly one state transition or side effect per message. It does
//! not know about sockets: replies go into the connection's [`Outbox`], which
//! the transport drains.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::protocol::{BoundRole, ClientMessage, Command, Outbox, ServerMessage};
use crate::registry::StreamRegistry;

use super::state::{Role, SessionState};

/// Per-connection protocol handler
pub struct Session {
    state: SessionState,
    registry: Arc<StreamRegistry>,
    outbox: Outbox,
}

impl Session {
    /// Create a handler for a new, unbound connection
    pub fn new(
        id: u64,
        peer_addr: SocketAddr,
        registry: Arc<StreamRegistry>,
        outbox: Outbox,
    ) -> Self {
        Self {
            state: SessionState::new(id, peer_addr),
            registry,
            outbox,
        }
    }

    /// Connection state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Handle one inbound text frame
    ///
    /// Any failure is reported to the client as an `error` record; the
    /// connection stays open and keeps its role.
    pub async fn handle_text(&mut self, text: &str) {
        self.state.messages_received += 1;

        let result = match ClientMessage::decode(text) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            self.reject(e);
        }
    }

    /// Reject a frame the transport could not hand over as text
    pub fn reject_frame(&mut self) {
        self.state.messages_received += 1;
        self.reject(Error::UnsupportedFrame);
    }

    fn reject(&mut self, error: Error) {
        tracing::warn!(
            session_id = self.state.id,
            role = self.state.role().name(),
            error = %error,
            "Rejected message"
        );
        self.state.errors_sent += 1;
        self.reply(ServerMessage::error(error.to_string()));
    }

    async fn dispatch(&mut self, message: ClientMessage) -> Result<()> {
        let role = self.state.role().clone();

        if let (Role::Commentator(bound), ClientMessage::AudioChunk { stream_id: Some(named), .. }) =
            (&role, &message)
        {
            if bound.as_str() != named.as_str() {
                tracing::debug!(
                    session_id = self.state.id,
                    bound = %bound,
                    named = %named,
                    "Chunk names another stream, routing to bound stream"
                );
            }
        }

        let kind = message.kind();
        let command = Command::try_from(message)?;

        match (role, command) {
            (Role::Unbound, Command::StartCommentator(stream_id)) => {
                self.registry
                    .announce_commentator(&stream_id, self.state.id)
                    .await;
                self.state.bind_commentator(stream_id);
                self.reply(ServerMessage::Ack {
                    role: BoundRole::Commentator,
                });
            }
            (Role::Unbound, Command::StartListener(stream_id, from_game_time)) => {
                // Ack goes out before the replay so the client sees it first
                self.reply(ServerMessage::Ack {
                    role: BoundRole::Listener,
                });
                self.registry
                    .join_listener(
                        &stream_id,
                        self.state.id,
                        from_game_time,
                        self.outbox.clone(),
                    )
                    .await;
                self.state.bind_listener(stream_id);
            }
            (Role::Unbound, Command::Submit(_)) => {
                return Err(Error::RoleViolation {
                    role: "unbound",
                    message: "audio-chunk requires start-commentator first",
                });
            }
            (Role::Commentator(stream_id), Command::Submit(chunk)) => {
                self.state.chunks_submitted += 1;
                self.registry.broadcast(&stream_id, chunk).await;
            }
            (Role::Commentator(_), _) => {
                tracing::debug!(session_id = self.state.id, kind, "Commentator rebind attempt");
                return Err(Error::RoleViolation {
                    role: "commentator",
                    message: "connection is already bound",
                });
            }
            (Role::Listener(_), _) => {
                return Err(Error::RoleViolation {
                    role: "listener",
                    message: "listener connections are receive-only",
                });
            }
        }

        Ok(())
    }

    /// Handle the connection going away
    ///
    /// A listener is removed from its stream. A commentator leaves nothing to
    /// clean up: its stream's history and listeners stay as they are.
    pub async fn disconnect(&self) {
        match self.state.role() {
            Role::Listener(stream_id) => {
                self.registry
                    .remove_listener(stream_id, self.state.id)
                    .await;
            }
            Role::Commentator(stream_id) => {
                tracing::info!(
                    stream = %stream_id,
                    session_id = self.state.id,
                    chunks = self.state.chunks_submitted,
                    "Commentator disconnected"
                );
            }
            Role::Unbound => {}
        }
    }

    fn reply(&self, message: ServerMessage) {
        // Fails only once the writer is gone, which means the peer is too
        let _ = self.outbox.send(message);
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use tokio::sync::mpsc;

    use super::*;
    use crate::registry::{AudioChunk, StreamId};

    struct Client {
        session: Session,
        rx: mpsc::UnboundedReceiver<ServerMessage>,
    }

    impl Client {
        fn connect(id: u64, registry: &Arc<StreamRegistry>) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 40000 + id as u16);
            Self {
                session: Session::new(id, addr, Arc::clone(registry), tx),
                rx,
            }
        }

        async fn send(&mut self, json: serde_json::Value) {
            self.session.handle_text(&json.to_string()).await;
        }

        fn received(&mut self) -> Vec<serde_json::Value> {
            let mut out = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                out.push(serde_json::to_value(&msg).unwrap());
            }
            out
        }

        fn errors(&mut self) -> usize {
            self.received()
                .iter()
                .filter(|v| v["type"] == "error")
                .count()
        }
    }

    fn start_commentator(stream: &str) -> serde_json::Value {
        serde_json::json!({ "type": "start-commentator", "streamId": stream })
    }

    fn start_listener(stream: &str, game_time: u64) -> serde_json::Value {
        serde_json::json!({ "type": "start-listener", "streamId": stream, "gameTime": game_time })
    }

    fn audio(stream: &str, game_time: u64, audio: &str, timestamp: i64) -> serde_json::Value {
        serde_json::json!({
            "type": "audio-chunk",
            "streamId": stream,
            "gameTime": game_time,
            "audio": audio,
            "timestamp": timestamp,
        })
    }

    fn chunk_json(game_time: u64, audio: &str, timestamp: i64) -> serde_json::Value {
        serde_json::json!({
            "type": "audio-chunk",
            "gameTime": game_time,
            "audio": audio,
            "timestamp": timestamp,
        })
    }

    #[tokio::test]
    async fn test_commentator_and_two_listeners() {
        let registry = Arc::new(StreamRegistry::new());
        let mut c = Client::connect(1, &registry);
        let mut a = Client::connect(2, &registry);
        let mut b = Client::connect(3, &registry);

        c.send(start_commentator("m1")).await;
        assert_eq!(
            c.received(),
            vec![serde_json::json!({ "type": "ack", "role": "commentator" })]
        );

        c.send(audio("m1", 10, "QQ==", 1000)).await;
        assert!(c.received().is_empty());

        a.send(start_listener("m1", 5)).await;
        assert_eq!(
            a.received(),
            vec![
                serde_json::json!({ "type": "ack", "role": "listener" }),
                chunk_json(10, "QQ==", 1000),
            ]
        );

        b.send(start_listener("m1", 15)).await;
        assert_eq!(
            b.received(),
            vec![serde_json::json!({ "type": "ack", "role": "listener" })]
        );

        c.send(audio("m1", 20, "Qg==", 2000)).await;
        assert_eq!(a.received(), vec![chunk_json(20, "Qg==", 2000)]);
        assert_eq!(b.received(), vec![chunk_json(20, "Qg==", 2000)]);
        assert!(c.received().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_message_keeps_connection_unbound() {
        let registry = Arc::new(StreamRegistry::new());
        let mut client = Client::connect(1, &registry);

        client.session.handle_text("{not json").await;
        client.send(serde_json::json!({ "type": "hello" })).await;
        client.send(start_commentator("")).await;
        assert_eq!(client.errors(), 3);
        assert_eq!(client.session.state().role(), &Role::Unbound);
        assert_eq!(registry.stream_count().await, 0);

        // Still usable afterwards
        client.send(start_listener("m1", 0)).await;
        assert_eq!(
            client.received(),
            vec![serde_json::json!({ "type": "ack", "role": "listener" })]
        );
    }

    #[tokio::test]
    async fn test_unbound_chunk_is_rejected() {
        let registry = Arc::new(StreamRegistry::new());
        let mut client = Client::connect(1, &registry);

        client.send(audio("m1", 1, "QQ==", 1)).await;
        let replies = client.received();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["type"], "error");
        assert!(replies[0]["message"]
            .as_str()
            .unwrap()
            .contains("start-commentator"));
        assert!(!registry.stream_exists(&StreamId::new("m1").unwrap()).await);
    }

    #[tokio::test]
    async fn test_commentator_cannot_rebind() {
        let registry = Arc::new(StreamRegistry::new());
        let mut c = Client::connect(1, &registry);

        c.send(start_commentator("m1")).await;
        c.received();

        c.send(start_listener("m1", 0)).await;
        c.send(start_commentator("m2")).await;
        assert_eq!(c.errors(), 2);

        let m1 = StreamId::new("m1").unwrap();
        assert_eq!(c.session.state().role(), &Role::Commentator(m1.clone()));
        assert_eq!(registry.get_stream_stats(&m1).await.unwrap().listeners, 0);
        assert!(!registry.stream_exists(&StreamId::new("m2").unwrap()).await);
    }

    #[tokio::test]
    async fn test_listener_is_receive_only() {
        let registry = Arc::new(StreamRegistry::new());
        let mut l = Client::connect(1, &registry);

        l.send(start_listener("m1", 0)).await;
        l.received();

        l.send(audio("m1", 1, "QQ==", 1)).await;
        l.send(start_commentator("m1")).await;
        l.send(start_listener("m1", 0)).await;
        assert_eq!(l.errors(), 3);

        let m1 = StreamId::new("m1").unwrap();
        let stats = registry.get_stream_stats(&m1).await.unwrap();
        assert_eq!(stats.chunks, 0);
        assert_eq!(stats.listeners, 1);
        assert_eq!(stats.commentator_announcements, 0);
    }

    #[tokio::test]
    async fn test_bad_audio_is_rejected_without_state_change() {
        let registry = Arc::new(StreamRegistry::new());
        let mut c = Client::connect(1, &registry);
        c.send(start_commentator("m1")).await;
        c.received();

        c.send(audio("m1", 1, "***", 1)).await;
        assert_eq!(c.errors(), 1);

        let m1 = StreamId::new("m1").unwrap();
        assert!(registry.history_snapshot(&m1).await.is_empty());
        assert_eq!(c.session.state().chunks_submitted, 0);
    }

    #[tokio::test]
    async fn test_chunk_routes_to_bound_stream() {
        let registry = Arc::new(StreamRegistry::new());
        let mut c = Client::connect(1, &registry);
        c.send(start_commentator("m1")).await;

        c.send(audio("other", 3, "QQ==", 1)).await;

        let m1 = StreamId::new("m1").unwrap();
        assert_eq!(
            registry.history_snapshot(&m1).await,
            vec![AudioChunk::from_base64(3, "QQ==", 1).unwrap()]
        );
        assert!(!registry.stream_exists(&StreamId::new("other").unwrap()).await);
    }

    #[tokio::test]
    async fn test_listener_disconnect_prunes_registration() {
        let registry = Arc::new(StreamRegistry::new());
        let mut l = Client::connect(1, &registry);
        l.send(start_listener("m1", 0)).await;

        let m1 = StreamId::new("m1").unwrap();
        assert_eq!(registry.get_stream_stats(&m1).await.unwrap().listeners, 1);

        l.session.disconnect().await;
        assert_eq!(registry.get_stream_stats(&m1).await.unwrap().listeners, 0);
    }

    #[tokio::test]
    async fn test_commentator_disconnect_leaves_stream_alive() {
        let registry = Arc::new(StreamRegistry::new());
        let mut c = Client::connect(1, &registry);
        let mut l = Client::connect(2, &registry);

        c.send(start_commentator("m1")).await;
        l.send(start_listener("m1", 0)).await;
        c.send(audio("m1", 1, "QQ==", 1)).await;
        c.session.disconnect().await;

        let m1 = StreamId::new("m1").unwrap();
        let stats = registry.get_stream_stats(&m1).await.unwrap();
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.listeners, 1);

        // No end-of-stream notice: the listener only got ack + chunk
        assert_eq!(l.received().len(), 2);

        // A late listener still catches up
        let mut late = Client::connect(3, &registry);
        late.send(start_listener("m1", 0)).await;
        assert_eq!(late.received().len(), 2);
    }

    #[tokio::test]
    async fn test_second_commentator_is_not_excluded() {
        let registry = Arc::new(StreamRegistry::new());
        let mut first = Client::connect(1, &registry);
        let mut second = Client::connect(2, &registry);

        first.send(start_commentator("m1")).await;
        second.send(start_commentator("m1")).await;
        first.send(audio("m1", 1, "QQ==", 1)).await;
        second.send(audio("m1", 2, "Qg==", 2)).await;

        assert_eq!(first.received().len(), 1);
        assert_eq!(second.received().len(), 1);

        let m1 = StreamId::new("m1").unwrap();
        assert_eq!(registry.history_snapshot(&m1).await.len(), 2);
    }

    #[tokio::test]
    async fn test_binary_frame_rejected() {
        let registry = Arc::new(StreamRegistry::new());
        let mut client = Client::connect(1, &registry);
        client.session.reject_frame();

        let replies = client.received();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["type"], "error");
        assert_eq!(client.session.state().errors_sent, 1);
        assert_eq!(client.session.state().messages_received, 1);
    }
}
