//! Live connection management: per-connection state, the registry that
//! routes frames to users and rooms, the read/write pumps, and the upgrade
//! endpoint.

pub mod connection;
pub mod handler;
pub mod registry;
pub mod session;
pub mod upgrade;
