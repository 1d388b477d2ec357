//! Correlates outstanding requests with the handler that must process the
//! response.
//!
//! Every request is tracked under a scenario key (`<prefix>-<uuid>`) and an
//! optional typed payload. A key is popped exactly once; responses whose key
//! is unknown were superseded and are dropped by the caller.

use std::collections::HashMap;
use std::time::Instant;

use tracing::debug;
use uuid::Uuid;

use chatsync_shared::types::{MessageId, Millis};

/// Why a request was issued and what its response handler needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestPurpose {
    UnreadTop { last_seen_time: Millis },
    UnreadBottom { last_seen_time: Millis },
    CaughtUp,
    MoreTop,
    MoreBottom,
    Reconnect,
    MoveToTop {
        message_id: MessageId,
        time: Millis,
        highlight: bool,
        move_to_bottom: bool,
    },
    MoveToBottom,
    Offset,
    Reactions { message_ids: Vec<MessageId> },
}

impl RequestPurpose {
    pub fn is_history(&self) -> bool {
        !matches!(self, Self::Reactions { .. })
    }

    /// Requests that grow the list upwards.
    pub fn loads_top(&self) -> bool {
        matches!(
            self,
            Self::UnreadTop { .. }
                | Self::CaughtUp
                | Self::MoreTop
                | Self::Offset
                | Self::MoveToTop { .. }
        )
    }

    /// Requests that grow the list downwards.
    pub fn loads_bottom(&self) -> bool {
        matches!(
            self,
            Self::UnreadBottom { .. } | Self::MoreBottom | Self::Reconnect | Self::MoveToBottom
        )
    }
}

#[derive(Debug, Clone)]
pub struct TrackedRequest {
    pub key: String,
    pub purpose: RequestPurpose,
    pub issued_at: Instant,
}

#[derive(Debug, Default)]
pub struct RequestTracker {
    entries: HashMap<String, TrackedRequest>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new request and return its unique scenario key.
    pub fn track(&mut self, prefix: &str, purpose: RequestPurpose) -> String {
        let key = format!("{prefix}-{}", Uuid::new_v4());
        debug!(key = %key, purpose = ?purpose, "tracking request");
        self.entries.insert(
            key.clone(),
            TrackedRequest {
                key: key.clone(),
                purpose,
                issued_at: Instant::now(),
            },
        );
        key
    }

    pub fn peek(&self, key: &str) -> Option<&RequestPurpose> {
        self.entries.get(key).map(|t| &t.purpose)
    }

    pub fn pop(&mut self, key: &str) -> Option<TrackedRequest> {
        self.entries.remove(key)
    }

    pub fn has_pending(&self, predicate: impl Fn(&RequestPurpose) -> bool) -> bool {
        self.entries.values().any(|t| predicate(&t.purpose))
    }

    /// Forget every history request; their responses become stale. The
    /// purposes are returned so their loading indicators can be reset.
    pub fn drop_history(&mut self) -> Vec<RequestPurpose> {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, t)| t.purpose.is_history())
            .map(|(key, _)| key.clone())
            .collect();
        keys.iter()
            .filter_map(|key| self.entries.remove(key))
            .map(|t| t.purpose)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_unique_and_popped_once() {
        let mut tracker = RequestTracker::new();
        let a = tracker.track("MORE-TOP", RequestPurpose::MoreTop);
        let b = tracker.track("MORE-TOP", RequestPurpose::MoreTop);
        assert_ne!(a, b);
        assert!(a.starts_with("MORE-TOP-"));

        assert_eq!(tracker.pop(&a).unwrap().purpose, RequestPurpose::MoreTop);
        assert!(tracker.pop(&a).is_none());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_unknown_key_is_ignored() {
        let mut tracker = RequestTracker::new();
        assert!(tracker.pop("nope").is_none());
        assert!(tracker.peek("nope").is_none());
    }

    #[test]
    fn test_drop_history_keeps_reaction_batches() {
        let mut tracker = RequestTracker::new();
        tracker.track("MORE-TOP", RequestPurpose::MoreTop);
        let reactions = tracker.track(
            "REACTION-SUMMARY",
            RequestPurpose::Reactions {
                message_ids: vec![1, 2],
            },
        );
        assert_eq!(tracker.drop_history(), vec![RequestPurpose::MoreTop]);
        assert!(tracker.peek(&reactions).is_some());
    }

    #[test]
    fn test_pending_direction_checks() {
        let mut tracker = RequestTracker::new();
        tracker.track("RECONNECT-BOTTOM", RequestPurpose::Reconnect);
        assert!(tracker.has_pending(RequestPurpose::loads_bottom));
        assert!(!tracker.has_pending(RequestPurpose::loads_top));
    }
}
