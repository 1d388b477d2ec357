use std::time::Instant;

use tracing::{debug, info};

use chatsync_shared::constants::{KEY_MORE_BOTTOM, KEY_MORE_TOP, KEY_OFFSET, KEY_RECONNECT};
use chatsync_shared::types::ConnectionStatus;
use chatsync_shared::HistoryRequest;

use super::HistoryEngine;
use crate::request_tracker::RequestPurpose;
use crate::scroll::{LoadDirection, ScrollMetrics};
use crate::state;

impl HistoryEngine {
    /// Load the page older than the oldest acknowledged message.
    pub fn load_more_top(&mut self) {
        if !self.has_next_top || self.tracker.has_pending(RequestPurpose::loads_top) {
            return;
        }
        let Some(first) = self.sections.first_acknowledged_message() else {
            return;
        };
        let request = HistoryRequest::to_time(self.thread.id, self.config.page_size, first.time);
        self.issue_history(KEY_MORE_TOP, RequestPurpose::MoreTop, request);
    }

    /// Load the page newer than the newest acknowledged message.
    pub fn load_more_bottom(&mut self) {
        if !self.has_next_bottom || self.tracker.has_pending(RequestPurpose::loads_bottom) {
            return;
        }
        let Some(last) = self.sections.last_acknowledged_message() else {
            return;
        };
        let request = HistoryRequest::from_time(
            self.thread.id,
            self.config.page_size,
            last.time.saturating_add(1),
        );
        self.issue_history(KEY_MORE_BOTTOM, RequestPurpose::MoreBottom, request);
    }

    pub fn scroll_changed(&mut self, metrics: ScrollMetrics) {
        if !self.initial_load_done {
            return;
        }
        match self.scroll.on_scroll(Instant::now(), metrics) {
            Some(LoadDirection::Top) => self.load_more_top(),
            Some(LoadDirection::Bottom) => self.load_more_bottom(),
            None => {}
        }
    }

    pub(crate) fn on_connection(&mut self, status: ConnectionStatus) {
        let previous = std::mem::replace(&mut self.connection, status);
        state::lock(&self.app_state).connection_status = status;
        if previous == status {
            return;
        }
        info!(thread = self.thread.id, ?previous, ?status, "connection status changed");

        match status {
            ConnectionStatus::Connected if self.initial_load_done => self.reconnect(),
            ConnectionStatus::Disconnected => self.invalidate_reactions(),
            _ => {}
        }
    }

    /// Fill the gap accumulated while offline with one fetch after the
    /// newest acknowledged message, then refresh reactions on screen.
    fn reconnect(&mut self) {
        if self.tracker.has_pending(|p| *p == RequestPurpose::Reconnect) {
            debug!("reconnect fetch already pending");
            return;
        }
        match self.sections.last_acknowledged_message() {
            Some(last) => {
                let request = HistoryRequest::from_time(
                    self.thread.id,
                    self.config.page_size,
                    last.time.saturating_add(1),
                );
                self.issue_history(KEY_RECONNECT, RequestPurpose::Reconnect, request);
            }
            None => {
                let request = HistoryRequest::offset(self.thread.id, self.config.page_size, 0);
                self.issue_history(KEY_OFFSET, RequestPurpose::Offset, request);
            }
        }

        let visible = self.server_ids_of_visible();
        self.fetch_reactions(visible);
    }

    pub fn row_appeared(&mut self, unique_id: &str) {
        if !self.visible.appeared(unique_id) {
            return;
        }
        let Some(row) = self
            .sections
            .index_path_by_unique_id(unique_id)
            .and_then(|at| self.sections.row(at))
        else {
            return;
        };

        let stale_id = row
            .message
            .server_id()
            .filter(|_| row.reactions_stale);
        let is_last = !row.is_banner()
            && self.sections.last_message().map(|m| m.unique_id.as_str()) == Some(unique_id)
            && self.is_true_last(&row.message);

        if let Some(id) = stale_id {
            self.fetch_reactions(vec![id]);
        }
        if is_last {
            self.delegate.last_message_appeared(true);
        }
    }

    pub fn row_disappeared(&mut self, unique_id: &str) {
        if !self.visible.disappeared(unique_id) {
            return;
        }
        let is_last = self
            .sections
            .last_message()
            .is_some_and(|m| m.unique_id == unique_id && self.is_true_last(m));
        if is_last {
            self.delegate.last_message_appeared(false);
        }
    }
}
