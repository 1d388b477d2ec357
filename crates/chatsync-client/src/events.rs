use serde::Serialize;
use tokio::sync::mpsc;

use chatsync_shared::types::Participant;

use crate::delegate::{HistoryDelegate, InsertEdge, ScrollPosition};
use crate::sections::IndexPath;

/// One delegate callback, as a value that can cross a channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryUpdate {
    Reload,
    Inserted {
        sections: Vec<usize>,
        rows: Vec<IndexPath>,
        edge: InsertEdge,
        scroll_to: Option<IndexPath>,
    },
    Removed {
        at: IndexPath,
        section_removed: bool,
    },
    Moved {
        from: IndexPath,
        to: IndexPath,
    },
    ReloadData(Vec<IndexPath>),
    Edited(IndexPath),
    Delivered(IndexPath),
    Seen(IndexPath),
    Sent(IndexPath),
    PinChanged(IndexPath),
    ScrollTo {
        unique_id: String,
        position: ScrollPosition,
        animate: bool,
    },
    Highlight {
        at: IndexPath,
        highlight: bool,
    },
    TopAnimation(bool),
    CenterAnimation(bool),
    BottomAnimation(bool),
    EmptyState(bool),
    LastMessageAppeared(bool),
    PrefetchAvatars(Vec<Participant>),
}

/// Delegate that forwards every callback over an unbounded channel so the
/// UI thread can apply them on its own schedule.
#[derive(Debug, Clone)]
pub struct ChannelDelegate {
    tx: mpsc::UnboundedSender<HistoryUpdate>,
}

impl HistoryUpdate {
    /// JSON payload for UI layers that consume updates as events.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl ChannelDelegate {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HistoryUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn emit(&self, update: HistoryUpdate) {
        if let Err(e) = self.tx.send(update) {
            tracing::debug!(update = ?e.0, "UI receiver gone, dropping update");
        }
    }
}

impl HistoryDelegate for ChannelDelegate {
    fn reload(&self) {
        self.emit(HistoryUpdate::Reload);
    }

    fn inserted(
        &self,
        sections: Vec<usize>,
        rows: Vec<IndexPath>,
        edge: InsertEdge,
        scroll_to: Option<IndexPath>,
    ) {
        self.emit(HistoryUpdate::Inserted {
            sections,
            rows,
            edge,
            scroll_to,
        });
    }

    fn removed(&self, at: IndexPath, section_removed: bool) {
        self.emit(HistoryUpdate::Removed {
            at,
            section_removed,
        });
    }

    fn move_row(&self, from: IndexPath, to: IndexPath) {
        self.emit(HistoryUpdate::Moved { from, to });
    }

    fn reload_data(&self, at: Vec<IndexPath>) {
        self.emit(HistoryUpdate::ReloadData(at));
    }

    fn edited(&self, at: IndexPath) {
        self.emit(HistoryUpdate::Edited(at));
    }

    fn delivered(&self, at: IndexPath) {
        self.emit(HistoryUpdate::Delivered(at));
    }

    fn seen(&self, at: IndexPath) {
        self.emit(HistoryUpdate::Seen(at));
    }

    fn sent(&self, at: IndexPath) {
        self.emit(HistoryUpdate::Sent(at));
    }

    fn pin_changed(&self, at: IndexPath) {
        self.emit(HistoryUpdate::PinChanged(at));
    }

    fn scroll_to(&self, unique_id: &str, position: ScrollPosition, animate: bool) {
        self.emit(HistoryUpdate::ScrollTo {
            unique_id: unique_id.to_string(),
            position,
            animate,
        });
    }

    fn set_highlight_row_at(&self, at: IndexPath, highlight: bool) {
        self.emit(HistoryUpdate::Highlight { at, highlight });
    }

    fn start_top_animation(&self, show: bool) {
        self.emit(HistoryUpdate::TopAnimation(show));
    }

    fn start_center_animation(&self, show: bool) {
        self.emit(HistoryUpdate::CenterAnimation(show));
    }

    fn start_bottom_animation(&self, show: bool) {
        self.emit(HistoryUpdate::BottomAnimation(show));
    }

    fn empty_state_changed(&self, is_empty: bool) {
        self.emit(HistoryUpdate::EmptyState(is_empty));
    }

    fn last_message_appeared(&self, appeared: bool) {
        self.emit(HistoryUpdate::LastMessageAppeared(appeared));
    }

    fn prefetch_avatars(&self, participants: Vec<Participant>) {
        self.emit(HistoryUpdate::PrefetchAvatars(participants));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callbacks_arrive_in_order() {
        let (delegate, mut rx) = ChannelDelegate::new();
        delegate.reload();
        delegate.seen(IndexPath::new(0, 2));

        assert_eq!(rx.try_recv().unwrap(), HistoryUpdate::Reload);
        assert_eq!(rx.try_recv().unwrap(), HistoryUpdate::Seen(IndexPath::new(0, 2)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_update_json_payload() {
        let json = HistoryUpdate::Seen(IndexPath::new(0, 2)).to_json().unwrap();
        assert_eq!(json, r#"{"seen":{"section":0,"row":2}}"#);
        assert_eq!(HistoryUpdate::Reload.to_json().unwrap(), r#""reload""#);
    }

    #[test]
    fn test_dropped_receiver_is_not_fatal() {
        let (delegate, rx) = ChannelDelegate::new();
        drop(rx);
        delegate.empty_state_changed(true);
    }
}
