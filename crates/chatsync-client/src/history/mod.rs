//! The thread history synchronization engine.
//!
//! [`HistoryEngine`] owns the [`MessageSections`] of one opened thread and is
//! the only code that mutates them. It is driven from a single task (see
//! [`crate::actor`]); its `impl` is split across modules the same way the
//! store splits `impl Database`:
//!
//! - `bootstrap`  -- scenario selection, response routing, jump-to-message
//! - `pagination` -- load-more in both directions, reconnect, visibility
//! - `push`       -- server push events
//! - [`crate::reactions`], [`crate::uploads`], [`crate::highlight`]

mod bootstrap;
mod pagination;
mod push;


use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

use chatsync_shared::types::{
    ConnectionStatus, Message, MessageId, Participant, ThreadInfo,
};
use chatsync_shared::{ChatEvent, HistoryRequest};

use crate::cache_bridge::CacheBridge;
use crate::config::SyncConfig;
use crate::delegate::{HistoryDelegate, InsertEdge};
use crate::highlight::{HighlightController, TimerEvent};
use crate::reactions::ReactionSync;
use crate::request_tracker::{RequestPurpose, RequestTracker};
use crate::row::{MessageRow, RowContext};
use crate::scroll::ScrollCoordinator;
use crate::sections::{IndexPath, MessageSection, MessageSections};
use crate::state::{self, AppState};
use crate::transport::ChatTransport;
use crate::visible::VisibleRangeTracker;

/// Copy of the store handed out for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSnapshot {
    pub sections: Vec<MessageSection>,
    pub has_next_top: bool,
    pub has_next_bottom: bool,
    pub highlighted: Option<String>,
    pub is_at_bottom: bool,
}

/// Result of merging one page into the store. Index paths are valid after
/// the whole page was applied.
#[derive(Debug, Default)]
pub(crate) struct MergeOutcome {
    pub inserted: Vec<IndexPath>,
    pub new_sections: Vec<usize>,
}

pub struct HistoryEngine {
    pub(crate) config: SyncConfig,
    pub(crate) thread: ThreadInfo,
    pub(crate) current_user_id: i64,
    pub(crate) app_state: Arc<Mutex<AppState>>,
    pub(crate) transport: Arc<dyn ChatTransport>,
    pub(crate) delegate: Arc<dyn HistoryDelegate>,
    pub(crate) cache: Option<CacheBridge>,

    pub(crate) sections: MessageSections,
    pub(crate) tracker: RequestTracker,
    pub(crate) visible: VisibleRangeTracker,
    pub(crate) scroll: ScrollCoordinator,
    pub(crate) highlighter: HighlightController,
    pub(crate) reactions: ReactionSync,

    pub(crate) has_next_top: bool,
    pub(crate) has_next_bottom: bool,
    pub(crate) initial_load_done: bool,
    pub(crate) connection: ConnectionStatus,
    /// New messages pushed while a load towards the live edge was in flight.
    pub(crate) held_messages: Vec<Message>,
    reported_empty: Option<bool>,

    decelerating: watch::Receiver<bool>,
    deceleration_gate: Arc<watch::Sender<bool>>,
}

impl HistoryEngine {
    /// Build an engine for one thread. The returned receiver carries timer
    /// expirations and must be fed back through [`HistoryEngine::handle_timer`].
    pub fn new(
        config: SyncConfig,
        thread: ThreadInfo,
        app_state: Arc<Mutex<AppState>>,
        transport: Arc<dyn ChatTransport>,
        delegate: Arc<dyn HistoryDelegate>,
    ) -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (gate_tx, gate_rx) = watch::channel(false);
        let (current_user_id, connection) = {
            let guard = state::lock(&app_state);
            (guard.current_user.id, guard.connection_status)
        };

        let engine = Self {
            scroll: ScrollCoordinator::new(&config),
            highlighter: HighlightController::new(config.highlight_duration, timer_tx),
            config,
            thread,
            current_user_id,
            app_state,
            transport,
            delegate,
            cache: None,
            sections: MessageSections::new(),
            tracker: RequestTracker::new(),
            visible: VisibleRangeTracker::new(),
            reactions: ReactionSync::new(),
            has_next_top: true,
            has_next_bottom: true,
            initial_load_done: false,
            connection,
            held_messages: Vec::new(),
            reported_empty: None,
            decelerating: gate_rx,
            deceleration_gate: Arc::new(gate_tx),
        };
        (engine, timer_rx)
    }

    /// Write incoming pages and pushes through to a local cache.
    pub fn with_cache(mut self, cache: CacheBridge) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sender side of the scroll-deceleration gate. `true` holds every merge
    /// until it flips back to `false`.
    pub fn deceleration_gate(&self) -> Arc<watch::Sender<bool>> {
        self.deceleration_gate.clone()
    }

    pub fn thread(&self) -> &ThreadInfo {
        &self.thread
    }

    pub fn sections(&self) -> &MessageSections {
        &self.sections
    }

    pub fn has_next_top(&self) -> bool {
        self.has_next_top
    }

    pub fn has_next_bottom(&self) -> bool {
        self.has_next_bottom
    }

    pub fn highlighted(&self) -> Option<&str> {
        self.highlighter.current()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            sections: self.sections.sections().to_vec(),
            has_next_top: self.has_next_top,
            has_next_bottom: self.has_next_bottom,
            highlighted: self.highlighter.current().map(str::to_string),
            is_at_bottom: self.is_at_bottom(),
        }
    }

    /// True when the newest rendered row is the thread's real last message
    /// and it is on screen.
    pub fn is_at_bottom(&self) -> bool {
        let Some(last) = self.sections.last_message() else {
            return true;
        };
        self.is_true_last(last) && self.visible.is_visible(&last.unique_id)
    }

    pub(crate) fn is_true_last(&self, message: &Message) -> bool {
        match (self.thread.last_message_id, message.server_id()) {
            (Some(last_id), Some(id)) => id >= last_id,
            _ => true,
        }
    }

    pub(crate) fn row_context(&self) -> RowContext {
        RowContext {
            current_user_id: self.current_user_id,
            thread_type: self.thread.thread_type,
        }
    }

    /// Route one SDK event to its handler.
    pub async fn handle_event(&mut self, event: ChatEvent) {
        if let Some(thread_id) = event.thread_id() {
            if thread_id != self.thread.id {
                trace!(thread = thread_id, "event for another thread ignored");
                return;
            }
        }
        if let Some(cache) = &self.cache {
            cache.record(&event);
        }

        match event {
            ChatEvent::History { key, response } => self.on_history(key, response).await,
            ChatEvent::RequestCancelled { key } => self.on_request_cancelled(&key),
            ChatEvent::NewMessage(message) => self.on_new_message(message).await,
            ChatEvent::Edited(message) => self.on_edited(message).await,
            ChatEvent::Deleted {
                message_id,
                unique_id,
                ..
            } => self.on_deleted(message_id, unique_id.as_deref()).await,
            ChatEvent::Sent {
                unique_id,
                message_id,
                time,
                ..
            } => self.on_sent(&unique_id, message_id, time).await,
            ChatEvent::Delivered {
                message_id,
                unique_id,
                ..
            } => self.on_delivered(message_id, unique_id.as_deref()),
            ChatEvent::Seen {
                message_id,
                unique_id,
                ..
            } => self.on_seen(message_id, unique_id.as_deref()),
            ChatEvent::Pinned {
                message_id, pinned, ..
            } => self.on_pinned(message_id, pinned),
            ChatEvent::ReactionSummaries { key, summaries, .. } => {
                self.on_reaction_summaries(&key, summaries)
            }
            ChatEvent::ReactionAdded {
                message_id,
                reaction,
                ..
            } => self.on_reaction_added(message_id, reaction),
            ChatEvent::ReactionReplaced {
                message_id,
                old_emoji,
                reaction,
                ..
            } => self.on_reaction_replaced(message_id, &old_emoji, reaction),
            ChatEvent::ReactionRemoved {
                message_id,
                reaction,
                ..
            } => self.on_reaction_removed(message_id, reaction),
            ChatEvent::Connection(status) => self.on_connection(status),
        }
    }

    /// Register a history request and hand it to the transport.
    ///
    /// When the transport refuses the request the tracker entry is dropped
    /// and the loading indicator switched off again.
    pub(crate) fn issue_history(
        &mut self,
        prefix: &str,
        purpose: RequestPurpose,
        request: HistoryRequest,
    ) -> Option<String> {
        self.set_loading(&purpose, true);
        let key = self.tracker.track(prefix, purpose);
        debug!(
            thread = self.thread.id,
            key = %key,
            from_time = ?request.from_time,
            to_time = ?request.to_time,
            "requesting history"
        );
        match self.transport.request_history(&key, &request) {
            Ok(()) => Some(key),
            Err(e) => {
                warn!(key = %key, error = %e, "history request failed to send");
                if let Some(tracked) = self.tracker.pop(&key) {
                    self.set_loading(&tracked.purpose, false);
                }
                None
            }
        }
    }

    pub(crate) fn set_loading(&self, purpose: &RequestPurpose, show: bool) {
        match purpose {
            RequestPurpose::MoreTop => self.delegate.start_top_animation(show),
            RequestPurpose::MoreBottom
            | RequestPurpose::Reconnect
            | RequestPurpose::UnreadBottom { .. }
            | RequestPurpose::MoveToBottom => self.delegate.start_bottom_animation(show),
            RequestPurpose::UnreadTop { .. }
            | RequestPurpose::CaughtUp
            | RequestPurpose::Offset
            | RequestPurpose::MoveToTop { .. } => self.delegate.start_center_animation(show),
            RequestPurpose::Reactions { .. } => {}
        }
    }

    /// Wait until the list stops decelerating. Mutating rows under a moving
    /// finger yanks the content.
    pub(crate) async fn wait_for_deceleration(&mut self) {
        if *self.decelerating.borrow() {
            trace!("merge waiting for deceleration to end");
        }
        let _ = self.decelerating.wait_for(|decelerating| !*decelerating).await;
    }

    /// Merge a page of messages into the store.
    ///
    /// Rows already present (same unique id, or same server id) are updated
    /// in place; the rest are built in parallel and inserted. The first
    /// population of an empty store is announced as a full reload, later
    /// merges as a precise insert diff.
    pub(crate) async fn merge(&mut self, mut messages: Vec<Message>, edge: InsertEdge) -> MergeOutcome {
        if messages.is_empty() {
            return MergeOutcome::default();
        }
        messages.sort_by_key(|m| m.time);

        let mut existing = Vec::new();
        let mut fresh = Vec::new();
        let mut seen = HashSet::new();
        for message in messages {
            if !seen.insert(message.unique_id.clone()) {
                continue;
            }
            let found = self
                .sections
                .index_path_by_unique_id(&message.unique_id)
                .or_else(|| {
                    message
                        .server_id()
                        .and_then(|id| self.sections.index_path_by_message_id(id))
                });
            match found {
                Some(_) => existing.push(message),
                None => fresh.push(message),
            }
        }

        let rows = build_rows(fresh, self.row_context()).await;
        self.wait_for_deceleration().await;

        let was_empty = self.sections.is_empty();
        let mut touched = Vec::new();
        for message in existing {
            if let Some(unique_id) = self.update_in_place(message) {
                touched.push(unique_id);
            }
        }

        let dates_before: Vec<_> = self.sections.sections().iter().map(|s| s.date).collect();
        let inserted_ids: Vec<String> = rows.iter().map(|r| r.unique_id().to_string()).collect();
        for row in rows {
            self.sections.insert(row);
        }

        let inserted: Vec<IndexPath> = inserted_ids
            .iter()
            .filter_map(|u| self.sections.index_path_by_unique_id(u))
            .collect();
        let new_sections: Vec<usize> = self
            .sections
            .sections()
            .iter()
            .enumerate()
            .filter(|(_, s)| !dates_before.contains(&s.date))
            .map(|(i, _)| i)
            .collect();
        let flags_changed = self.sections.recompute_run_flags(self.thread.thread_type);

        if was_empty {
            self.delegate.reload();
        } else {
            if !inserted.is_empty() {
                self.delegate
                    .inserted(new_sections.clone(), inserted.clone(), edge, None);
            }
            let mut reload: Vec<IndexPath> = touched
                .iter()
                .filter_map(|u| self.sections.index_path_by_unique_id(u))
                .chain(flags_changed)
                .filter(|ip| !inserted.contains(ip))
                .collect();
            reload.sort();
            reload.dedup();
            if !reload.is_empty() {
                self.delegate.reload_data(reload);
            }
        }

        debug!(
            thread = self.thread.id,
            inserted = inserted.len(),
            updated = touched.len(),
            sections = new_sections.len(),
            "merged page"
        );

        let ids = self.sections.server_ids_at(&inserted);
        self.fetch_reactions(ids);
        self.prefetch_avatars(&inserted);

        MergeOutcome {
            inserted,
            new_sections,
        }
    }

    /// Swap a newer copy of a message into its existing row. A row whose
    /// time changed is moved back into order.
    ///
    /// Returns the unique id of the updated row.
    pub(crate) fn update_in_place(&mut self, message: Message) -> Option<String> {
        let at = self
            .sections
            .index_path_by_unique_id(&message.unique_id)
            .or_else(|| {
                message
                    .server_id()
                    .and_then(|id| self.sections.index_path_by_message_id(id))
            })?;
        let ctx = self.row_context();
        let row = self.sections.row_mut(at)?;
        let time_changed = row.message.time != message.time;
        let unique_id = message.unique_id.clone();
        row.update_message(message, &ctx);

        if time_changed {
            self.reposition_row(at);
        }
        Some(unique_id)
    }

    /// Put a row whose time changed back into sorted position and report it
    /// as a single move. A move that creates or drops a day section falls
    /// back to a full reload.
    pub(crate) fn reposition_row(&mut self, at: IndexPath) -> IndexPath {
        let sections_before = self.sections.sections().len();
        match self.sections.reposition(at) {
            Some((from, to)) => {
                if self.sections.sections().len() == sections_before {
                    self.delegate.move_row(from, to);
                } else {
                    self.delegate.reload();
                }
                to
            }
            None => at,
        }
    }

    pub(crate) fn prefetch_avatars(&self, at: &[IndexPath]) {
        let mut seen = HashSet::new();
        let participants: Vec<Participant> = at
            .iter()
            .filter_map(|ip| self.sections.row(*ip))
            .filter(|row| !row.is_me)
            .filter_map(|row| row.message.participant.clone())
            .filter(|p| seen.insert(p.id))
            .collect();
        if !participants.is_empty() {
            self.delegate.prefetch_avatars(participants);
        }
    }

    /// Report emptiness once per change, after the first population.
    pub(crate) fn report_empty_state(&mut self) {
        if !self.initial_load_done {
            return;
        }
        let empty = self.sections.is_empty();
        if self.reported_empty != Some(empty) {
            self.reported_empty = Some(empty);
            self.delegate.empty_state_changed(empty);
        }
    }

    pub(crate) fn server_ids_of_visible(&self) -> Vec<MessageId> {
        self.visible
            .unique_ids()
            .filter_map(|u| self.sections.index_path_by_unique_id(u))
            .filter_map(|ip| self.sections.row(ip))
            .filter_map(|row| row.message.server_id())
            .collect()
    }

    /// Forget pending history requests and switch their loading indicators
    /// off; late responses to them are dropped as stale.
    pub(crate) fn drop_pending_history(&mut self) {
        let dropped = self.tracker.drop_history();
        for purpose in &dropped {
            self.set_loading(purpose, false);
        }
        if !dropped.is_empty() {
            debug!(dropped = dropped.len(), "superseded pending history requests");
        }
    }

    /// Cancel timers and forget every outstanding request.
    pub fn close(&mut self) {
        self.highlighter.cancel();
        self.drop_pending_history();
        self.reactions.clear();
        debug!(thread = self.thread.id, "history engine closed");
    }
}

/// Build row view-models on worker tasks and join them in page order.
async fn build_rows(messages: Vec<Message>, ctx: RowContext) -> Vec<MessageRow> {
    let tasks = messages.into_iter().map(|message| {
        let ctx = ctx.clone();
        tokio::spawn(async move { MessageRow::new(message, &ctx) })
    });

    join_all(tasks)
        .await
        .into_iter()
        .filter_map(|result| match result {
            Ok(row) => Some(row),
            Err(e) => {
                warn!(error = %e, "row calculation task failed");
                None
            }
        })
        .collect()
}
