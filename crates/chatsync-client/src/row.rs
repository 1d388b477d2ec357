//! Row view-model wrapping one message plus its derived render state.
//!
//! Rows are mutated in place as events arrive; they are never rebuilt
//! wholesale once rendered.

use chrono::{DateTime, Utc};
use serde::Serialize;

use chatsync_shared::types::{
    Message, MessageType, Millis, Participant, ReactionSummary, ThreadId, ThreadType,
    UploadState,
};

/// Inputs every row calculation needs besides the message itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowContext {
    pub current_user_id: i64,
    pub thread_type: ThreadType,
}

/// Synthetic rows sort after real messages sharing the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RowKind {
    Message,
    UnreadBanner,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FileState {
    NoFile,
    Queued,
    Uploading { progress: f32 },
    UploadFailed,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRow {
    pub message: Message,
    pub kind: RowKind,
    pub is_me: bool,
    pub is_first_message_of_user: bool,
    pub is_last_message_of_user: bool,
    pub show_avatar: bool,
    pub sender_label: Option<String>,
    pub time_label: String,
    pub file_state: FileState,
    pub highlighted: bool,
    pub reactions: Option<ReactionSummary>,
    /// Reactions must be re-fetched the next time the row becomes visible.
    pub reactions_stale: bool,
}

pub const UNREAD_BANNER_ID: &str = "unread-banner";

impl MessageRow {
    pub fn new(message: Message, ctx: &RowContext) -> Self {
        let mut row = Self {
            message,
            kind: RowKind::Message,
            is_me: false,
            is_first_message_of_user: true,
            is_last_message_of_user: true,
            show_avatar: false,
            sender_label: None,
            time_label: String::new(),
            file_state: FileState::NoFile,
            highlighted: false,
            reactions: None,
            reactions_stale: false,
        };
        row.recalculate(ctx);
        row
    }

    /// Banner separating the last seen message from unread ones.
    pub fn unread_banner(thread_id: ThreadId, last_seen_time: Millis) -> Self {
        let mut message = Message::text(None, UNREAD_BANNER_ID, thread_id, last_seen_time, None, "");
        message.text = None;
        Self {
            message,
            kind: RowKind::UnreadBanner,
            is_me: false,
            is_first_message_of_user: false,
            is_last_message_of_user: false,
            show_avatar: false,
            sender_label: None,
            time_label: String::new(),
            file_state: FileState::NoFile,
            highlighted: false,
            reactions: None,
            reactions_stale: false,
        }
    }

    /// Recompute everything derived from the message and the thread.
    pub fn recalculate(&mut self, ctx: &RowContext) {
        if self.is_banner() {
            return;
        }
        self.is_me = self.message.is_me(ctx.current_user_id);
        self.time_label = time_label(self.message.time);
        self.sender_label = if ctx.thread_type.is_group() && !self.is_me {
            self.message.participant.as_ref().map(display_name)
        } else {
            None
        };
        self.file_state = match &self.message.upload {
            Some(UploadState::Queued) => FileState::Queued,
            Some(UploadState::Uploading { progress }) => FileState::Uploading {
                progress: *progress,
            },
            Some(UploadState::Failed) => FileState::UploadFailed,
            None if self.message.message_type != MessageType::Text => FileState::Remote,
            None => FileState::NoFile,
        };
        self.refresh_avatar(ctx.thread_type);
    }

    /// Swap in a newer copy of the same message, keeping view state.
    pub fn update_message(&mut self, message: Message, ctx: &RowContext) {
        self.message = message;
        self.recalculate(ctx);
    }

    /// Returns true when either flag changed.
    pub fn set_run_flags(&mut self, first: bool, last: bool, thread_type: ThreadType) -> bool {
        let changed = self.is_first_message_of_user != first || self.is_last_message_of_user != last;
        self.is_first_message_of_user = first;
        self.is_last_message_of_user = last;
        self.refresh_avatar(thread_type);
        changed
    }

    fn refresh_avatar(&mut self, thread_type: ThreadType) {
        self.show_avatar = thread_type.is_group() && !self.is_me && self.is_last_message_of_user;
    }

    pub fn sort_key(&self) -> (Millis, RowKind) {
        (self.message.time, self.kind)
    }

    pub fn unique_id(&self) -> &str {
        &self.message.unique_id
    }

    pub fn is_banner(&self) -> bool {
        self.kind == RowKind::UnreadBanner
    }
}

fn display_name(participant: &Participant) -> String {
    participant
        .name
        .clone()
        .unwrap_or_else(|| format!("#{}", participant.id))
}

fn time_label(time: Millis) -> String {
    DateTime::<Utc>::from_timestamp_millis(time as i64)
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(thread_type: ThreadType) -> RowContext {
        RowContext {
            current_user_id: 1,
            thread_type,
        }
    }

    fn from(sender: i64) -> Message {
        Message::text(
            Some(3),
            "u3",
            1,
            1_700_000_000_000,
            Some(Participant {
                id: sender,
                name: Some("carol".into()),
            }),
            "hi",
        )
    }

    #[test]
    fn test_group_rows_from_others_carry_sender_and_avatar() {
        let row = MessageRow::new(from(2), &ctx(ThreadType::Group));
        assert!(!row.is_me);
        assert_eq!(row.sender_label.as_deref(), Some("carol"));
        assert!(row.show_avatar);
        assert_eq!(row.time_label.len(), 5);
    }

    #[test]
    fn test_own_rows_never_show_avatar() {
        let row = MessageRow::new(from(1), &ctx(ThreadType::Group));
        assert!(row.is_me);
        assert!(!row.show_avatar);
        assert!(row.sender_label.is_none());
    }

    #[test]
    fn test_run_flags_drive_avatar() {
        let mut row = MessageRow::new(from(2), &ctx(ThreadType::Group));
        assert!(row.set_run_flags(true, false, ThreadType::Group));
        assert!(!row.show_avatar);
        assert!(!row.set_run_flags(true, false, ThreadType::Group));
    }

    #[test]
    fn test_file_state_follows_upload() {
        let mut msg = from(1);
        msg.upload = Some(UploadState::Uploading { progress: 0.5 });
        let mut row = MessageRow::new(msg.clone(), &ctx(ThreadType::Normal));
        assert_eq!(row.file_state, FileState::Uploading { progress: 0.5 });

        msg.upload = None;
        msg.message_type = MessageType::Picture;
        row.update_message(msg, &ctx(ThreadType::Normal));
        assert_eq!(row.file_state, FileState::Remote);
    }

    #[test]
    fn test_banner_sorts_after_message_at_same_time() {
        let row = MessageRow::new(from(2), &ctx(ThreadType::Normal));
        let banner = MessageRow::unread_banner(1, row.message.time);
        assert!(row.sort_key() < banner.sort_key());
    }
}
