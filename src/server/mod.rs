//! Relay server
//!
//! HTTP/WebSocket front end: accepts connections, enforces the connection
//! limit and hands each upgraded socket to a [`connection::Connection`].

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use listener::RelayServer;
