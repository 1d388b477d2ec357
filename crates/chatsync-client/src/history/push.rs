use std::time::Instant;

use tracing::{debug, info};

use chatsync_shared::types::{Message, MessageId, Millis};

use super::HistoryEngine;
use crate::delegate::InsertEdge;
use crate::request_tracker::RequestPurpose;
use crate::row::MessageRow;
use crate::sections::IndexPath;

impl HistoryEngine {
    pub(crate) async fn on_new_message(&mut self, message: Message) {
        // Evaluated against the last message as it was before this one.
        let at_bottom = self.is_at_bottom();
        if let Some(id) = message.server_id() {
            if self.thread.last_message_id.map_or(true, |last| id >= last) {
                self.thread.last_message_id = Some(id);
                self.thread.last_message_time = Some(message.time);
            }
        }

        let known = self.sections.contains_unique_id(&message.unique_id)
            || message
                .server_id()
                .is_some_and(|id| self.sections.index_path_by_message_id(id).is_some());
        if known {
            self.wait_for_deceleration().await;
            if let Some(unique_id) = self.update_in_place(message) {
                self.reload_rows_of(&[unique_id]);
            }
            return;
        }

        if !self.initial_load_done || self.tracker.has_pending(RequestPurpose::loads_bottom) {
            debug!(
                thread = self.thread.id,
                unique_id = %message.unique_id,
                "new message held until the pending load completes"
            );
            self.held_messages.push(message);
            return;
        }

        if self.has_next_bottom {
            debug!(
                thread = self.thread.id,
                "new message beyond loaded window, not inserted"
            );
            return;
        }

        let is_me = message.is_me(self.current_user_id);
        let row = MessageRow::new(message, &self.row_context());
        self.wait_for_deceleration().await;

        let was_empty = self.sections.is_empty();
        let inserted = self.sections.insert(row);
        let changed = self.sections.recompute_run_flags(self.thread.thread_type);
        let scroll_to = self
            .scroll
            .should_auto_scroll(at_bottom, is_me)
            .then_some(inserted.index_path);

        if was_empty {
            self.delegate.reload();
        } else {
            let sections = if inserted.created_section {
                vec![inserted.index_path.section]
            } else {
                Vec::new()
            };
            self.delegate.inserted(
                sections,
                vec![inserted.index_path],
                InsertEdge::Bottom,
                scroll_to,
            );
            let changed: Vec<IndexPath> = changed
                .into_iter()
                .filter(|ip| *ip != inserted.index_path)
                .collect();
            if !changed.is_empty() {
                self.delegate.reload_data(changed);
            }
        }
        if scroll_to.is_some() {
            self.scroll.disable_excessive_loading(Instant::now());
        }
        self.report_empty_state();
    }

    /// Merge messages held during a load once nothing towards the bottom is
    /// pending. They are only kept when the window reached the live edge.
    pub(crate) async fn release_held_messages(&mut self) {
        if self.held_messages.is_empty()
            || !self.initial_load_done
            || self.tracker.has_pending(RequestPurpose::loads_bottom)
        {
            return;
        }
        let held = std::mem::take(&mut self.held_messages);
        if self.has_next_bottom {
            debug!(
                thread = self.thread.id,
                count = held.len(),
                "held messages beyond loaded window, not inserted"
            );
            return;
        }

        let outcome = self.merge(held, InsertEdge::Bottom).await;
        debug!(
            thread = self.thread.id,
            inserted = outcome.inserted.len(),
            "held messages merged"
        );
        self.report_empty_state();
    }

    pub(crate) async fn on_edited(&mut self, mut message: Message) {
        let Some(at) = self
            .sections
            .find(message.server_id(), Some(&message.unique_id))
        else {
            return;
        };
        message.edited = true;
        self.wait_for_deceleration().await;

        let ctx = self.row_context();
        let Some(row) = self.sections.row_mut(at) else {
            return;
        };
        let time_changed = row.message.time != message.time;
        row.update_message(message, &ctx);
        let at = if time_changed {
            self.reposition_row(at)
        } else {
            at
        };
        self.delegate.edited(at);
    }

    pub(crate) async fn on_deleted(&mut self, message_id: Option<MessageId>, unique_id: Option<&str>) {
        let Some(at) = self.sections.find(message_id, unique_id) else {
            return;
        };
        self.wait_for_deceleration().await;
        let Some(removed) = self.sections.remove(at) else {
            return;
        };
        info!(
            thread = self.thread.id,
            unique_id = removed.row.unique_id(),
            "message deleted"
        );

        let removed_id = removed.row.unique_id().to_string();
        self.visible.disappeared(&removed_id);
        if self.highlighter.current() == Some(removed_id.as_str()) {
            self.highlighter.cancel();
        }
        if let Some(id) = removed.row.message.server_id() {
            self.reactions.forget(&[id]);
            if self.thread.last_message_id == Some(id) {
                let last = self.sections.last_acknowledged_message();
                self.thread.last_message_id = last.and_then(|m| m.server_id());
                self.thread.last_message_time = last.map(|m| m.time);
            }
        }

        self.delegate.removed(removed.index_path, removed.removed_section);
        let changed = self.sections.recompute_run_flags(self.thread.thread_type);
        if !changed.is_empty() {
            self.delegate.reload_data(changed);
        }
        self.report_empty_state();
    }

    /// The server acknowledged an optimistic send: stamp its id and time and
    /// move it into place if the authoritative time differs.
    pub(crate) async fn on_sent(&mut self, unique_id: &str, message_id: MessageId, time: Millis) {
        let Some(at) = self.sections.index_path_by_unique_id(unique_id) else {
            return;
        };
        self.wait_for_deceleration().await;

        let ctx = self.row_context();
        let Some(row) = self.sections.row_mut(at) else {
            return;
        };
        let time_changed = row.message.time != time;
        row.message.id = Some(message_id);
        row.message.time = time;
        row.message.upload = None;
        row.recalculate(&ctx);
        debug!(unique_id, message_id, time_changed, "send acknowledged");

        if self.thread.last_message_id.map_or(true, |last| message_id >= last) {
            self.thread.last_message_id = Some(message_id);
            self.thread.last_message_time = Some(time);
        }

        let at = if time_changed {
            self.reposition_row(at)
        } else {
            at
        };
        self.delegate.sent(at);
        let changed = self.sections.recompute_run_flags(self.thread.thread_type);
        if !changed.is_empty() {
            self.delegate.reload_data(changed);
        }
    }

    pub(crate) fn on_delivered(&mut self, message_id: Option<MessageId>, unique_id: Option<&str>) {
        let Some(at) = self.sections.find(message_id, unique_id) else {
            return;
        };
        if let Some(row) = self.sections.row_mut(at) {
            row.message.delivered = true;
        }
        self.delegate.delivered(at);
    }

    /// Mark a message seen. The server only reports the newest seen
    /// message, so every older own message is marked delivered and seen too.
    pub(crate) fn on_seen(&mut self, message_id: Option<MessageId>, unique_id: Option<&str>) {
        let target = self.sections.find(message_id, unique_id);
        let boundary = message_id.or_else(|| {
            target
                .and_then(|at| self.sections.row(at))
                .and_then(|row| row.message.server_id())
        });

        if let Some(at) = target {
            if let Some(row) = self.sections.row_mut(at) {
                row.message.delivered = true;
                row.message.seen = true;
            }
            self.delegate.seen(at);
        }

        let Some(boundary) = boundary else {
            return;
        };
        let older: Vec<IndexPath> = self
            .sections
            .rows()
            .filter(|(_, row)| row.is_me && !row.message.seen)
            .filter(|(_, row)| row.message.server_id().is_some_and(|id| id < boundary))
            .map(|(ip, _)| ip)
            .collect();
        for at in older {
            if let Some(row) = self.sections.row_mut(at) {
                row.message.delivered = true;
                row.message.seen = true;
            }
            self.delegate.seen(at);
        }
    }

    pub(crate) fn on_pinned(&mut self, message_id: MessageId, pinned: bool) {
        let Some(at) = self.sections.index_path_by_message_id(message_id) else {
            return;
        };
        if let Some(row) = self.sections.row_mut(at) {
            row.message.pinned = pinned;
        }
        self.delegate.pin_changed(at);
    }

    fn reload_rows_of(&self, unique_ids: &[String]) {
        let at: Vec<IndexPath> = unique_ids
            .iter()
            .filter_map(|u| self.sections.index_path_by_unique_id(u))
            .collect();
        if !at.is_empty() {
            self.delegate.reload_data(at);
        }
    }
}
