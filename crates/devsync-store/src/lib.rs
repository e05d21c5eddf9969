//! # devsync-store
//!
//! `SQLite` storage behind the devsync collaborator traits.
//!
//! - **Connection**: `r2d2` pool with WAL and foreign keys enabled on every
//!   connection
//! - **Migrations**: embedded SQL applied in version order, tracked in
//!   `schema_version`
//! - **Repositories**: stateless structs over `&Connection` for users, chat
//!   rooms and messages
//! - **Store**: [`SqliteStore`] implements `MessageStore` and
//!   `RoomMembership`, running blocking queries on the tokio blocking pool

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repositories;
pub mod store;

pub use connection::{ConnectionConfig, ConnectionPool};
pub use errors::{DbError, Result};
pub use store::SqliteStore;
