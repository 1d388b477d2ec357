//! Callbacks the rendering layer implements to follow store changes.
//!
//! Every callback carries index paths valid right after the mutation it
//! describes. Callbacks arrive in mutation order, so applying them in
//! sequence keeps a mirrored list consistent with the store.

use serde::{Deserialize, Serialize};

use chatsync_shared::types::Participant;

use crate::sections::IndexPath;

/// Which edge an incremental insert grew, used to pick the animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertEdge {
    Top,
    Bottom,
    Fade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollPosition {
    Top,
    Center,
    Bottom,
}

pub trait HistoryDelegate: Send + Sync {
    /// Full invalidate. Only sent when the store is populated from empty.
    fn reload(&self);

    fn inserted(
        &self,
        sections: Vec<usize>,
        rows: Vec<IndexPath>,
        edge: InsertEdge,
        scroll_to: Option<IndexPath>,
    );

    fn removed(&self, at: IndexPath, section_removed: bool);

    fn move_row(&self, from: IndexPath, to: IndexPath);

    fn reload_data(&self, at: Vec<IndexPath>);

    fn edited(&self, at: IndexPath);

    fn delivered(&self, at: IndexPath);

    fn seen(&self, at: IndexPath);

    fn sent(&self, at: IndexPath);

    fn pin_changed(&self, at: IndexPath);

    fn scroll_to(&self, unique_id: &str, position: ScrollPosition, animate: bool);

    fn set_highlight_row_at(&self, at: IndexPath, highlight: bool);

    fn start_top_animation(&self, show: bool);

    fn start_center_animation(&self, show: bool);

    fn start_bottom_animation(&self, show: bool);

    fn empty_state_changed(&self, is_empty: bool);

    /// The thread's true last message entered (`true`) or left the viewport.
    fn last_message_appeared(&self, appeared: bool);

    fn prefetch_avatars(&self, participants: Vec<Participant>);
}
