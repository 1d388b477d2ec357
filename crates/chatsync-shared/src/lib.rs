//! # chatsync-shared
//!
//! Domain types shared by the history cache and the synchronization core:
//! identifiers, messages, thread metadata, the chat SDK collaborator
//! contract and the tunable constants.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::{SyncError, TransportError};
pub use protocol::{ChatEvent, HistoryRequest, HistoryResponse, SortOrder};
pub use types::*;
