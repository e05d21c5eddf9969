//! # devsync-server
//!
//! Axum HTTP + `WebSocket` server hosting the devsync real-time hub.
//!
//! - `WebSocket` gateway: authenticated upgrade, one registry entry per
//!   user, bounded per-connection queues with slow-consumer eviction
//! - Routing: direct delivery to a user and fan-out to room members
//! - REST send endpoints that persist first and then hand delivery to the hub
//! - Health, Prometheus metrics, graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod api;
pub mod auth;
pub mod config;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::{AppState, DevsyncServer};
pub use websocket::registry::Hub;
