//! Outbound primitives of the chat SDK.
//!
//! Calls are fire-and-forget: the SDK answers later with a [`ChatEvent`]
//! tagged with the key passed here. An `Err` means the request never left,
//! so no answer will come.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use chatsync_shared::types::{MessageId, ThreadId};
use chatsync_shared::{ChatEvent, HistoryRequest, TransportError};

use crate::cache_bridge::CacheBridge;

pub trait ChatTransport: Send + Sync {
    fn request_history(&self, key: &str, request: &HistoryRequest) -> Result<(), TransportError>;

    fn request_reaction_summaries(
        &self,
        key: &str,
        thread_id: ThreadId,
        message_ids: &[MessageId],
    ) -> Result<(), TransportError>;

    /// Abort an in-flight upload keyed by its client unique id.
    fn cancel_upload(&self, unique_id: &str) -> Result<(), TransportError>;
}

/// Transport wrapper that answers history requests from the local cache
/// first, then forwards them to the network.
pub struct CachingTransport<T> {
    inner: T,
    cache: CacheBridge,
    events: mpsc::UnboundedSender<ChatEvent>,
}

impl<T: ChatTransport> CachingTransport<T> {
    pub fn new(inner: T, cache: CacheBridge, events: mpsc::UnboundedSender<ChatEvent>) -> Self {
        Self {
            inner,
            cache,
            events,
        }
    }
}

impl<T: ChatTransport> ChatTransport for CachingTransport<T> {
    fn request_history(&self, key: &str, request: &HistoryRequest) -> Result<(), TransportError> {
        if let Some(response) = self.cache.history(request) {
            if !response.messages.is_empty() {
                debug!(key, count = response.messages.len(), "Serving page from cache");
                let event = ChatEvent::History {
                    key: key.to_string(),
                    response,
                };
                if self.events.send(event).is_err() {
                    warn!(key, "Event receiver gone, cached page dropped");
                }
            }
        }
        self.inner.request_history(key, request)
    }

    fn request_reaction_summaries(
        &self,
        key: &str,
        thread_id: ThreadId,
        message_ids: &[MessageId],
    ) -> Result<(), TransportError> {
        self.inner
            .request_reaction_summaries(key, thread_id, message_ids)
    }

    fn cancel_upload(&self, unique_id: &str) -> Result<(), TransportError> {
        self.inner.cancel_upload(unique_id)
    }
}

#[cfg(test)]
mod tests {
    use chatsync_shared::HistoryResponse;

    use super::*;
    use crate::testing::{message, RecordingTransport, THREAD};

    #[test]
    fn test_cached_page_is_posted_before_forwarding() {
        let cache = CacheBridge::in_memory().unwrap();
        cache.record(&ChatEvent::History {
            key: "seed".into(),
            response: HistoryResponse {
                thread_id: THREAD,
                messages: vec![message(1, 1_000, 2), message(2, 2_000, 2)],
                has_next: false,
                from_cache: false,
            },
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let network = RecordingTransport::default();
        let transport = CachingTransport::new(network, cache, tx);
        let request = HistoryRequest::to_time(THREAD, 25, 5_000);
        transport.request_history("MORE-TOP-1", &request).unwrap();

        match rx.try_recv().unwrap() {
            ChatEvent::History { key, response } => {
                assert_eq!(key, "MORE-TOP-1");
                assert!(response.from_cache);
                assert_eq!(response.messages.len(), 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(transport.inner.history_requests().len(), 1);
    }

    #[test]
    fn test_empty_cache_only_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let transport =
            CachingTransport::new(RecordingTransport::default(), CacheBridge::in_memory().unwrap(), tx);
        transport
            .request_history("OFFSET-FETCH-1", &HistoryRequest::offset(THREAD, 25, 0))
            .unwrap();

        assert!(rx.try_recv().is_err());
        assert_eq!(transport.inner.history_requests().len(), 1);
    }
}
