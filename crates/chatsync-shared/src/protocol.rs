//! Collaborator contract with the chat SDK.
//!
//! Requests go out through the transport primitives; everything that comes
//! back (history pages, acks, pushes, connection changes) arrives as a
//! [`ChatEvent`] tagged with the thread it belongs to.

use serde::{Deserialize, Serialize};

use crate::types::{
    ConnectionStatus, Message, MessageId, Millis, Reaction, ReactionSummary, ThreadId,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A paginated history fetch.
///
/// Exactly one of `from_time` / `to_time` is set for cursor pagination;
/// neither is set for an offset fetch of the most recent page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryRequest {
    pub thread_id: ThreadId,
    pub count: usize,
    /// Exclusive lower bound, results ascending.
    pub from_time: Option<Millis>,
    /// Exclusive upper bound, results descending.
    pub to_time: Option<Millis>,
    pub offset: Option<usize>,
    pub order: SortOrder,
}

impl HistoryRequest {
    /// Page of messages strictly newer than `from_time`.
    pub fn from_time(thread_id: ThreadId, count: usize, from_time: Millis) -> Self {
        Self {
            thread_id,
            count,
            from_time: Some(from_time),
            to_time: None,
            offset: None,
            order: SortOrder::Ascending,
        }
    }

    /// Page of messages strictly older than `to_time`.
    pub fn to_time(thread_id: ThreadId, count: usize, to_time: Millis) -> Self {
        Self {
            thread_id,
            count,
            from_time: None,
            to_time: Some(to_time),
            offset: None,
            order: SortOrder::Descending,
        }
    }

    /// The most recent page, counted from the newest message.
    pub fn offset(thread_id: ThreadId, count: usize, offset: usize) -> Self {
        Self {
            thread_id,
            count,
            from_time: None,
            to_time: None,
            offset: Some(offset),
            order: SortOrder::Descending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryResponse {
    pub thread_id: ThreadId,
    pub messages: Vec<Message>,
    pub has_next: bool,
    /// Served from the local cache rather than the network.
    pub from_cache: bool,
}

/// Everything the SDK can deliver to a thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ChatEvent {
    /// Response to a history request tagged with its scenario key.
    History {
        key: String,
        response: HistoryResponse,
    },
    /// The request tagged `key` failed, timed out or was cancelled.
    RequestCancelled { key: String },
    NewMessage(Message),
    Edited(Message),
    Deleted {
        thread_id: ThreadId,
        message_id: Option<MessageId>,
        unique_id: Option<String>,
    },
    Sent {
        thread_id: ThreadId,
        unique_id: String,
        message_id: MessageId,
        time: Millis,
    },
    Delivered {
        thread_id: ThreadId,
        message_id: Option<MessageId>,
        unique_id: Option<String>,
    },
    Seen {
        thread_id: ThreadId,
        message_id: Option<MessageId>,
        unique_id: Option<String>,
    },
    Pinned {
        thread_id: ThreadId,
        message_id: MessageId,
        pinned: bool,
    },
    ReactionSummaries {
        key: String,
        thread_id: ThreadId,
        summaries: Vec<ReactionSummary>,
    },
    ReactionAdded {
        thread_id: ThreadId,
        message_id: MessageId,
        reaction: Reaction,
    },
    ReactionReplaced {
        thread_id: ThreadId,
        message_id: MessageId,
        old_emoji: String,
        reaction: Reaction,
    },
    ReactionRemoved {
        thread_id: ThreadId,
        message_id: MessageId,
        reaction: Reaction,
    },
    Connection(ConnectionStatus),
}

impl ChatEvent {
    /// Thread the event is scoped to; `None` for session-wide events.
    pub fn thread_id(&self) -> Option<ThreadId> {
        match self {
            Self::History { response, .. } => Some(response.thread_id),
            Self::NewMessage(m) | Self::Edited(m) => Some(m.thread_id),
            Self::Deleted { thread_id, .. }
            | Self::Sent { thread_id, .. }
            | Self::Delivered { thread_id, .. }
            | Self::Seen { thread_id, .. }
            | Self::Pinned { thread_id, .. }
            | Self::ReactionSummaries { thread_id, .. }
            | Self::ReactionAdded { thread_id, .. }
            | Self::ReactionReplaced { thread_id, .. }
            | Self::ReactionRemoved { thread_id, .. } => Some(*thread_id),
            Self::RequestCancelled { .. } | Self::Connection(_) => None,
        }
    }
}
