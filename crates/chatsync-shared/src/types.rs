use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Server-assigned thread identifier.
pub type ThreadId = i64;

/// Server-assigned message identifier. Ids grow monotonically per thread.
pub type MessageId = i64;

/// Milliseconds since the Unix epoch.
pub type Millis = u64;

/// Generate a fresh client-side unique id for an outgoing message.
pub fn new_unique_id() -> String {
    Uuid::new_v4().to_string()
}

/// Calendar day (UTC) a millisecond timestamp falls on.
pub fn day_of(time: Millis) -> NaiveDate {
    DateTime::<Utc>::from_timestamp_millis(time as i64)
        .unwrap_or_default()
        .date_naive()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Participant {
    pub id: i64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ThreadType {
    #[default]
    Normal,
    Group,
    Channel,
}

impl ThreadType {
    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group | Self::Channel)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum MessageType {
    #[default]
    Text,
    File,
    Picture,
    Voice,
    Video,
    Location,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplyInfo {
    pub replied_to_message_id: Option<MessageId>,
    pub replied_to_time: Option<Millis>,
    pub preview: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForwardInfo {
    pub origin_thread_id: Option<ThreadId>,
    pub origin_participant: Option<Participant>,
}

/// Progress of a client-originated file or text that the server has not
/// acknowledged yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum UploadState {
    Queued,
    Uploading { progress: f32 },
    Failed,
}

/// A chat message as delivered by the SDK or created locally on send.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Absent until the server acknowledges the message.
    pub id: Option<MessageId>,
    /// Client-generated; correlates optimistic sends with server acks.
    pub unique_id: String,
    pub thread_id: ThreadId,
    pub time: Millis,
    pub participant: Option<Participant>,
    pub text: Option<String>,
    pub message_type: MessageType,
    pub delivered: bool,
    pub seen: bool,
    pub pinned: bool,
    pub edited: bool,
    pub reply_info: Option<ReplyInfo>,
    pub forward_info: Option<ForwardInfo>,
    pub upload: Option<UploadState>,
}

impl Message {
    /// A plain text message with only the required fields filled in.
    pub fn text(
        id: Option<MessageId>,
        unique_id: impl Into<String>,
        thread_id: ThreadId,
        time: Millis,
        participant: Option<Participant>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id,
            unique_id: unique_id.into(),
            thread_id,
            time,
            participant,
            text: Some(text.into()),
            message_type: MessageType::Text,
            delivered: false,
            seen: false,
            pinned: false,
            edited: false,
            reply_info: None,
            forward_info: None,
            upload: None,
        }
    }

    /// Server id, but only when it is a real (positive) one.
    pub fn server_id(&self) -> Option<MessageId> {
        self.id.filter(|id| *id > 0)
    }

    pub fn sender_id(&self) -> Option<i64> {
        self.participant.as_ref().map(|p| p.id)
    }

    pub fn is_me(&self, current_user_id: i64) -> bool {
        self.sender_id() == Some(current_user_id)
    }

    pub fn is_upload(&self) -> bool {
        self.upload.is_some()
    }
}

/// Thread metadata known when the thread is opened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ThreadInfo {
    pub id: ThreadId,
    pub thread_type: ThreadType,
    pub last_message_id: Option<MessageId>,
    pub last_message_time: Option<Millis>,
    /// `0` when the user has never opened the thread.
    pub last_seen_message_id: MessageId,
    pub last_seen_message_time: Option<Millis>,
    pub unread_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Request to open a thread at a specific message instead of the default
/// bootstrap position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NavigationTarget {
    pub message_id: MessageId,
    pub time: Millis,
    pub highlight: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReactionCount {
    pub emoji: String,
    pub count: u32,
}

/// A single user's reaction on a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reaction {
    pub id: i64,
    pub emoji: String,
    pub participant: Participant,
}

/// Aggregated reactions for one message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ReactionSummary {
    pub message_id: MessageId,
    pub counts: Vec<ReactionCount>,
    pub current_user_reaction: Option<Reaction>,
}

impl ReactionSummary {
    pub fn empty(message_id: MessageId) -> Self {
        Self {
            message_id,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|c| c.count == 0)
    }

    /// Add one reaction with `emoji`, creating the bucket when missing.
    pub fn increment(&mut self, emoji: &str) {
        match self.counts.iter_mut().find(|c| c.emoji == emoji) {
            Some(c) => c.count += 1,
            None => self.counts.push(ReactionCount {
                emoji: emoji.to_string(),
                count: 1,
            }),
        }
    }

    /// Remove one reaction with `emoji`, dropping the bucket at zero.
    pub fn decrement(&mut self, emoji: &str) {
        if let Some(c) = self.counts.iter_mut().find(|c| c.emoji == emoji) {
            c.count = c.count.saturating_sub(1);
        }
        self.counts.retain(|c| c.count > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_of_groups_by_utc_day() {
        let morning = 1_700_000_000_000;
        let same_day = morning + 60_000;
        let next_day = morning + 24 * 3_600_000;
        assert_eq!(day_of(morning), day_of(same_day));
        assert!(day_of(morning) < day_of(next_day));
    }

    #[test]
    fn test_server_id_skips_placeholders() {
        let mut msg = Message::text(None, "u1", 1, 10, None, "hi");
        assert_eq!(msg.server_id(), None);
        msg.id = Some(0);
        assert_eq!(msg.server_id(), None);
        msg.id = Some(42);
        assert_eq!(msg.server_id(), Some(42));
    }

    #[test]
    fn test_reaction_summary_counts() {
        let mut summary = ReactionSummary::empty(7);
        summary.increment("like");
        summary.increment("like");
        summary.increment("heart");
        summary.decrement("heart");
        assert_eq!(summary.counts.len(), 1);
        assert_eq!(summary.counts[0].count, 2);
        summary.decrement("like");
        summary.decrement("like");
        assert!(summary.is_empty());
    }
}
