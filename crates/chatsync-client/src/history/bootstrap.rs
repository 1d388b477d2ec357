use std::time::Instant;

use tracing::{debug, info};

use chatsync_shared::constants::{
    KEY_CAUGHT_UP, KEY_MOVE_TO_BOTTOM, KEY_MOVE_TO_TOP, KEY_OFFSET, KEY_UNREAD_BOTTOM,
    KEY_UNREAD_TOP,
};
use chatsync_shared::types::{MessageId, Millis};
use chatsync_shared::{HistoryRequest, HistoryResponse};

use super::HistoryEngine;
use crate::delegate::{InsertEdge, ScrollPosition};
use crate::request_tracker::RequestPurpose;
use crate::row::{MessageRow, UNREAD_BANNER_ID};
use crate::scenario::{select_scenario, BootstrapScenario};
use crate::state;

impl HistoryEngine {
    /// Populate the store for a freshly opened thread.
    pub fn start(&mut self) {
        let deferred = state::lock(&self.app_state).take_navigation(self.thread.id);
        let scenario = select_scenario(&self.thread, deferred);
        info!(
            thread = self.thread.id,
            scenario = scenario.number(),
            "opening thread"
        );

        let thread_id = self.thread.id;
        let count = self.config.page_size;
        match scenario {
            BootstrapScenario::UnreadGap { last_seen_time } => {
                self.issue_history(
                    KEY_UNREAD_TOP,
                    RequestPurpose::UnreadTop { last_seen_time },
                    HistoryRequest::to_time(thread_id, count, last_seen_time.saturating_add(1)),
                );
            }
            BootstrapScenario::CaughtUp { last_seen_time } => {
                self.issue_history(
                    KEY_CAUGHT_UP,
                    RequestPurpose::CaughtUp,
                    HistoryRequest::to_time(thread_id, count, last_seen_time.saturating_add(1)),
                );
            }
            BootstrapScenario::Corrupted | BootstrapScenario::BrandNewEmpty => {
                self.issue_history(
                    KEY_OFFSET,
                    RequestPurpose::Offset,
                    HistoryRequest::offset(thread_id, count, 0),
                );
            }
            BootstrapScenario::NewlyAdded { message_id, time } => {
                self.move_to_remote(message_id, time, false, false);
            }
            BootstrapScenario::DeferredNavigation(target) => {
                self.move_to_remote(target.message_id, target.time, target.highlight, false);
            }
        }
    }

    /// Route a history page to the handler of the request that asked for it.
    ///
    /// Cached pages are merged for a fast first paint but are not
    /// authoritative: the request stays pending, cursors are untouched and no
    /// follow-up request is chained.
    pub(crate) async fn on_history(&mut self, key: String, response: HistoryResponse) {
        if response.from_cache {
            let Some(purpose) = self.tracker.peek(&key).cloned() else {
                debug!(key = %key, "dropping cached page for unknown request");
                return;
            };
            if purpose.is_history() {
                self.merge(response.messages, edge_for(&purpose)).await;
            }
            return;
        }

        let Some(tracked) = self.tracker.pop(&key) else {
            debug!(key = %key, "dropping stale history response");
            return;
        };
        let purpose = tracked.purpose;
        self.set_loading(&purpose, false);

        let has_next = response.has_next;
        let outcome = self.merge(response.messages, edge_for(&purpose)).await;
        debug!(
            key = %key,
            has_next,
            inserted = outcome.inserted.len(),
            latency_ms = tracked.issued_at.elapsed().as_millis() as u64,
            "history response merged"
        );

        match purpose {
            RequestPurpose::UnreadTop { last_seen_time } => {
                self.has_next_top = has_next;
                let chained = self.issue_history(
                    KEY_UNREAD_BOTTOM,
                    RequestPurpose::UnreadBottom { last_seen_time },
                    HistoryRequest::from_time(
                        self.thread.id,
                        self.config.page_size,
                        last_seen_time.saturating_add(1),
                    ),
                );
                if chained.is_none() {
                    self.scroll_to_last_row(false);
                    self.finish_initial_load();
                }
            }
            RequestPurpose::UnreadBottom { last_seen_time } => {
                self.has_next_bottom = has_next;
                if outcome.inserted.is_empty() {
                    self.scroll_to_last_row(false);
                } else {
                    self.insert_unread_banner(last_seen_time);
                }
                self.finish_initial_load();
            }
            RequestPurpose::CaughtUp | RequestPurpose::Offset => {
                self.has_next_top = has_next;
                self.has_next_bottom = false;
                self.scroll_to_last_row(false);
                self.finish_initial_load();
            }
            RequestPurpose::MoreTop => self.has_next_top = has_next,
            RequestPurpose::MoreBottom | RequestPurpose::Reconnect => {
                self.has_next_bottom = has_next;
            }
            RequestPurpose::MoveToTop {
                message_id,
                time,
                highlight,
                move_to_bottom,
            } => {
                self.has_next_top = has_next;
                self.reveal_target(message_id, highlight, move_to_bottom);
                let chained = self.issue_history(
                    KEY_MOVE_TO_BOTTOM,
                    RequestPurpose::MoveToBottom,
                    HistoryRequest::from_time(
                        self.thread.id,
                        self.config.page_size,
                        time.saturating_add(1),
                    ),
                );
                if chained.is_none() {
                    self.finish_initial_load();
                }
            }
            RequestPurpose::MoveToBottom => {
                self.has_next_bottom = has_next;
                self.finish_initial_load();
            }
            RequestPurpose::Reactions { .. } => {}
        }
        self.release_held_messages().await;
    }

    /// A request failed or timed out on the SDK side. Only the loading
    /// indicator is reset; nothing is retried.
    pub(crate) fn on_request_cancelled(&mut self, key: &str) {
        let Some(tracked) = self.tracker.pop(key) else {
            return;
        };
        info!(key, purpose = ?tracked.purpose, "request cancelled");
        self.set_loading(&tracked.purpose, false);
        if let RequestPurpose::Reactions { message_ids } = tracked.purpose {
            self.reactions.forget(&message_ids);
        }
    }

    /// Jump to a message, loading a window around it when it is not in the
    /// store yet.
    pub fn move_to(&mut self, message_id: MessageId, time: Millis, highlight: bool) {
        if let Some(at) = self.sections.index_path_by_message_id(message_id) {
            let Some(unique_id) = self.sections.row(at).map(|r| r.unique_id().to_string()) else {
                return;
            };
            debug!(message_id, "jump target already loaded");
            self.delegate
                .scroll_to(&unique_id, ScrollPosition::Center, true);
            self.scroll.disable_excessive_loading(Instant::now());
            if highlight {
                self.highlight(&unique_id);
            }
            return;
        }
        self.move_to_remote(message_id, time, highlight, false);
    }

    /// Scroll to the newest message, reloading the tail of the thread when
    /// it is not in the store.
    pub fn scroll_to_bottom(&mut self) {
        let target = match (self.thread.last_message_id, self.thread.last_message_time) {
            (Some(id), Some(time)) => Some((id, time)),
            _ => None,
        };
        let loaded = match target {
            Some((id, _)) => self.sections.index_path_by_message_id(id).is_some(),
            None => true,
        };
        match target {
            Some((id, time)) if !loaded => self.move_to_remote(id, time, false, true),
            _ => self.scroll_to_last_row(true),
        }
    }

    /// Clear everything and load the page ending at `time`, then the page
    /// after it.
    pub(crate) fn move_to_remote(
        &mut self,
        message_id: MessageId,
        time: Millis,
        highlight: bool,
        move_to_bottom: bool,
    ) {
        info!(thread = self.thread.id, message_id, "reloading around jump target");
        self.cancel_highlight();
        self.sections.clear();
        self.visible.clear();
        self.drop_pending_history();
        self.has_next_top = true;
        self.has_next_bottom = true;
        self.delegate.reload();

        self.issue_history(
            KEY_MOVE_TO_TOP,
            RequestPurpose::MoveToTop {
                message_id,
                time,
                highlight,
                move_to_bottom,
            },
            HistoryRequest::to_time(
                self.thread.id,
                self.config.page_size,
                time.saturating_add(1),
            ),
        );
    }

    /// Scroll to a jump target after its page arrived. A target missing from
    /// the page leaves the list where it is.
    fn reveal_target(&mut self, message_id: MessageId, highlight: bool, move_to_bottom: bool) {
        let Some(unique_id) = self
            .sections
            .index_path_by_message_id(message_id)
            .and_then(|at| self.sections.row(at))
            .map(|row| row.unique_id().to_string())
        else {
            debug!(message_id, "jump target missing from page");
            return;
        };
        let position = if move_to_bottom {
            ScrollPosition::Bottom
        } else {
            ScrollPosition::Center
        };
        self.delegate.scroll_to(&unique_id, position, false);
        self.scroll.disable_excessive_loading(Instant::now());
        if highlight {
            self.highlight(&unique_id);
        }
    }

    pub(crate) fn scroll_to_last_row(&mut self, animate: bool) {
        let Some(unique_id) = self.sections.last_message().map(|m| m.unique_id.clone()) else {
            return;
        };
        self.delegate
            .scroll_to(&unique_id, ScrollPosition::Bottom, animate);
        self.scroll.disable_excessive_loading(Instant::now());
    }

    /// Insert the unread banner right after the last seen message and
    /// scroll it to the top of the viewport.
    fn insert_unread_banner(&mut self, last_seen_time: Millis) {
        if self.sections.contains_unique_id(UNREAD_BANNER_ID) {
            return;
        }
        let inserted = self
            .sections
            .insert(MessageRow::unread_banner(self.thread.id, last_seen_time));
        let changed = self.sections.recompute_run_flags(self.thread.thread_type);

        let sections = if inserted.created_section {
            vec![inserted.index_path.section]
        } else {
            Vec::new()
        };
        self.delegate
            .inserted(sections, vec![inserted.index_path], InsertEdge::Fade, None);
        if !changed.is_empty() {
            self.delegate.reload_data(changed);
        }
        self.delegate
            .scroll_to(UNREAD_BANNER_ID, ScrollPosition::Top, false);
        self.scroll.disable_excessive_loading(Instant::now());
    }

    fn finish_initial_load(&mut self) {
        if !self.initial_load_done {
            info!(
                thread = self.thread.id,
                rows = self.sections.row_count(),
                "initial load complete"
            );
        }
        self.initial_load_done = true;
        self.report_empty_state();
    }
}

fn edge_for(purpose: &RequestPurpose) -> InsertEdge {
    if purpose.loads_top() {
        InsertEdge::Top
    } else {
        InsertEdge::Bottom
    }
}
