//! Bridge between the synchronization core and the SQLite history cache.
//!
//! Network pages and message pushes are written through to the cache so the
//! next opening of the thread can render before the server answers. Cache
//! failures are logged and otherwise ignored; the cache is never required
//! for correctness.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use chatsync_shared::{ChatEvent, HistoryRequest, HistoryResponse, SyncError};
use chatsync_store::Database;

use crate::config::SyncConfig;

#[derive(Clone)]
pub struct CacheBridge {
    db: Arc<Mutex<Database>>,
}

impl CacheBridge {
    /// Open the cache at the configured path, or the platform default.
    pub fn open(config: &SyncConfig) -> Result<Self, SyncError> {
        let db = match &config.cache_path {
            Some(path) => Database::open_at(path),
            None => Database::open_default(),
        }
        .map_err(|e| SyncError::Cache(e.to_string()))?;
        Ok(Self::from_database(db))
    }

    pub fn in_memory() -> Result<Self, SyncError> {
        let db = Database::open_in_memory().map_err(|e| SyncError::Cache(e.to_string()))?;
        Ok(Self::from_database(db))
    }

    pub fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look a page up in the cache. `None` when the lookup failed.
    pub fn history(&self, request: &HistoryRequest) -> Option<HistoryResponse> {
        match self.lock().history(request) {
            Ok(response) => Some(response),
            Err(e) => {
                warn!(thread = request.thread_id, error = %e, "Cache lookup failed");
                None
            }
        }
    }

    /// Write an incoming event through to the cache.
    pub fn record(&self, event: &ChatEvent) {
        let db = self.lock();
        let result = match event {
            ChatEvent::History { response, .. } if !response.from_cache => {
                let stored = response
                    .messages
                    .iter()
                    .try_for_each(|m| db.upsert_message(m));
                if stored.is_ok() {
                    debug!(
                        thread = response.thread_id,
                        count = response.messages.len(),
                        "Cached history page"
                    );
                }
                stored
            }
            ChatEvent::NewMessage(message) | ChatEvent::Edited(message) => {
                db.upsert_message(message)
            }
            ChatEvent::Deleted {
                thread_id,
                message_id,
                unique_id,
            } => db
                .delete_message(*thread_id, unique_id.as_deref(), *message_id)
                .map(|_| ()),
            ChatEvent::Delivered {
                thread_id,
                message_id: Some(id),
                ..
            } => db.mark_status(*thread_id, *id, true, false),
            ChatEvent::Seen {
                thread_id,
                message_id: Some(id),
                ..
            } => db.mark_status(*thread_id, *id, true, true),
            _ => Ok(()),
        };

        if let Err(e) = result {
            warn!(error = %e, "Failed to write event to cache");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{message, THREAD};

    fn page(messages: Vec<chatsync_shared::Message>) -> ChatEvent {
        ChatEvent::History {
            key: "k".into(),
            response: HistoryResponse {
                thread_id: THREAD,
                messages,
                has_next: false,
                from_cache: false,
            },
        }
    }

    #[test]
    fn test_network_pages_and_pushes_are_written_through() {
        let cache = CacheBridge::in_memory().unwrap();
        cache.record(&page(vec![message(1, 1_000, 2), message(2, 2_000, 2)]));
        cache.record(&ChatEvent::NewMessage(message(3, 3_000, 2)));
        cache.record(&ChatEvent::Deleted {
            thread_id: THREAD,
            message_id: Some(1),
            unique_id: None,
        });

        let response = cache
            .history(&HistoryRequest::from_time(THREAD, 25, 0))
            .unwrap();
        let ids: Vec<_> = response.messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![Some(2), Some(3)]);
        assert!(response.from_cache);
    }

    #[test]
    fn test_cached_pages_are_not_rewritten() {
        let cache = CacheBridge::in_memory().unwrap();
        let mut event = page(vec![message(1, 1_000, 2)]);
        if let ChatEvent::History { response, .. } = &mut event {
            response.from_cache = true;
        }
        cache.record(&event);

        assert_eq!(cache.lock().count_for_thread(THREAD).unwrap(), 0);
    }

    #[test]
    fn test_open_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = SyncConfig {
            cache_path: Some(dir.path().join("history.db")),
            ..Default::default()
        };
        let cache = CacheBridge::open(&config).unwrap();
        cache.record(&ChatEvent::NewMessage(message(7, 7_000, 2)));

        let reopened = CacheBridge::open(&config).unwrap();
        assert_eq!(reopened.lock().count_for_thread(THREAD).unwrap(), 1);
    }
}
