//! Live audio commentary relay
//!
//! One commentator connection pushes small audio chunks tagged with a
//! match-clock time; any number of listener connections receive them live.
//! A listener joining late names the game time it wants to start from and is
//! first caught up from the buffered history, then switched to live delivery
//! with no gaps and no duplicates.
//!
//! # Example
//!
//! ```no_run
//! use commentary_relay::{RelayServer, ServerConfig};
//!
//! # async fn example() -> commentary_relay::error::Result<()> {
//! let config = ServerConfig::with_addr("127.0.0.1:8090".parse().unwrap());
//! let server = RelayServer::new(config);
//!
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

pub use error::{Error, Result};
pub use registry::{AudioChunk, RegistryConfig, StreamId, StreamRegistry};
pub use server::{RelayServer, ServerConfig};
