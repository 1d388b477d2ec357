//! # chatsync-store
//!
//! Local history cache backed by SQLite.
//!
//! The cache answers history requests with the same response shape as the
//! network, tagged `from_cache`, so the synchronization engine can render a
//! thread before the server replies. The crate exposes a synchronous
//! `Database` handle that wraps a `rusqlite::Connection`.

pub mod database;
pub mod messages;
pub mod migrations;

mod error;

pub use database::Database;
pub use error::StoreError;
