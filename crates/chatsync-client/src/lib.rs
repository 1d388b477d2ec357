//! # chatsync-client
//!
//! Keeps the message list of an opened chat thread consistent with the
//! server while the user scrolls, jumps, reconnects and sends.
//!
//! A [`HistoryEngine`] owns the day-sectioned store of one thread. It is
//! normally run inside its own task via [`spawn_thread_history`] and driven
//! through the returned [`ThreadHistoryHandle`]; every change is reported to
//! a [`HistoryDelegate`] as a minimal diff.

pub mod actor;
pub mod cache_bridge;
pub mod config;
pub mod delegate;
pub mod events;
pub mod highlight;
pub mod history;
pub mod reactions;
pub mod request_tracker;
pub mod row;
pub mod scenario;
pub mod scroll;
pub mod sections;
pub mod state;
pub mod transport;
pub mod uploads;
pub mod visible;

#[cfg(test)]
mod testing;

use tracing_subscriber::{fmt, EnvFilter};

pub use actor::{spawn_engine, spawn_thread_history, EngineCommand, ThreadHistoryHandle};
pub use cache_bridge::CacheBridge;
pub use config::SyncConfig;
pub use delegate::{HistoryDelegate, InsertEdge, ScrollPosition};
pub use events::{ChannelDelegate, HistoryUpdate};
pub use history::{HistoryEngine, StoreSnapshot};
pub use row::{FileState, MessageRow};
pub use scroll::ScrollMetrics;
pub use sections::{IndexPath, MessageSection, MessageSections};
pub use state::AppState;
pub use transport::{CachingTransport, ChatTransport};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Calling it twice is harmless.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chatsync_client=debug,chatsync_store=info,warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
