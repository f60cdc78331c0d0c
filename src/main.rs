//! Live commentary relay server
//!
//! Run with: commentary-relay [--bind ADDR] [--max-connections N] ...
//!
//! ## Commentating
//!
//! Connect to `ws://HOST:8090/`, send
//! `{"type":"start-commentator","streamId":"m1"}`, then one
//! `{"type":"audio-chunk","gameTime":10,"audio":"<base64>","timestamp":<ms>}`
//! per segment.
//!
//! ## Listening
//!
//! Connect and send `{"type":"start-listener","streamId":"m1","gameTime":0}`.
//! Buffered chunks from that game time arrive first, then live ones.

use std::net::SocketAddr;

use clap::Parser;
use commentary_relay::{RegistryConfig, RelayServer, ServerConfig};
use tracing_subscriber::EnvFilter;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "commentary-relay", version, about = "Live audio commentary relay")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "RELAY_BIND", default_value = "0.0.0.0:8090")]
    bind: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    #[arg(long, env = "RELAY_MAX_CONNECTIONS", default_value_t = 0)]
    max_connections: usize,

    /// Maximum inbound message size in bytes
    #[arg(long, env = "RELAY_MAX_MESSAGE_SIZE", default_value_t = commentary_relay::server::config::DEFAULT_MAX_MESSAGE_SIZE)]
    max_message_size: usize,

    /// Keep at most this many chunks per stream (default: unbounded)
    #[arg(long, env = "RELAY_HISTORY_MAX_CHUNKS")]
    history_max_chunks: Option<usize>,

    /// Keep at most this many payload bytes per stream (default: unbounded)
    #[arg(long, env = "RELAY_HISTORY_MAX_BYTES")]
    history_max_bytes: Option<usize>,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let mut registry = RegistryConfig::default();
        if let Some(max) = self.history_max_chunks {
            registry = registry.max_history_chunks(max);
        }
        if let Some(max) = self.history_max_bytes {
            registry = registry.max_history_bytes(max);
        }

        ServerConfig::with_addr(self.bind)
            .max_connections(self.max_connections)
            .max_message_size(self.max_message_size)
            .registry(registry)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("commentary_relay=info")),
        )
        .init();

    let config = args.server_config();
    if config.registry.is_unbounded() {
        tracing::warn!("Stream history is unbounded; memory grows with every chunk");
    }

    let server = RelayServer::new(config);
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::try_parse_from(["commentary-relay"]).unwrap();
        let config = args.server_config();

        assert_eq!(config.bind_addr.port(), 8090);
        assert_eq!(config.max_connections, 0);
        assert!(config.registry.is_unbounded());
    }

    #[test]
    fn test_history_limits() {
        let args = Args::try_parse_from([
            "commentary-relay",
            "--bind",
            "127.0.0.1:9001",
            "--history-max-chunks",
            "500",
            "--history-max-bytes",
            "1048576",
        ])
        .unwrap();
        let config = args.server_config();

        assert_eq!(config.bind_addr.port(), 9001);
        assert_eq!(config.registry.max_history_chunks, Some(500));
        assert_eq!(config.registry.max_history_bytes, Some(1_048_576));
    }
}
