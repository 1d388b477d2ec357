//! Test doubles for the SDK transport and helpers to build fixtures.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use chatsync_shared::types::{
    Message, MessageId, Millis, Participant, ThreadId, ThreadInfo, ThreadType,
};
use chatsync_shared::{ChatEvent, HistoryRequest, HistoryResponse, TransportError};

use crate::config::SyncConfig;
use crate::events::{ChannelDelegate, HistoryUpdate};
use crate::highlight::TimerEvent;
use crate::history::HistoryEngine;
use crate::state::AppState;
use crate::transport::ChatTransport;

pub const THREAD: ThreadId = 7;
pub const ME: i64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    History {
        key: String,
        request: HistoryRequest,
    },
    Reactions {
        key: String,
        message_ids: Vec<MessageId>,
    },
    CancelUpload(String),
}

/// Transport that records every call and never answers.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Recorded>>,
}

impl RecordingTransport {
    pub fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn history_requests(&self) -> Vec<(String, HistoryRequest)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Recorded::History { key, request } => Some((key, request)),
                _ => None,
            })
            .collect()
    }

    pub fn reaction_requests(&self) -> Vec<(String, Vec<MessageId>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Recorded::Reactions { key, message_ids } => Some((key, message_ids)),
                _ => None,
            })
            .collect()
    }
}

impl ChatTransport for RecordingTransport {
    fn request_history(&self, key: &str, request: &HistoryRequest) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(Recorded::History {
            key: key.to_string(),
            request: request.clone(),
        });
        Ok(())
    }

    fn request_reaction_summaries(
        &self,
        key: &str,
        _thread_id: ThreadId,
        message_ids: &[MessageId],
    ) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(Recorded::Reactions {
            key: key.to_string(),
            message_ids: message_ids.to_vec(),
        });
        Ok(())
    }

    fn cancel_upload(&self, unique_id: &str) -> Result<(), TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(Recorded::CancelUpload(unique_id.to_string()));
        Ok(())
    }
}

pub fn user(id: i64) -> Participant {
    Participant {
        id,
        name: Some(format!("user{id}")),
    }
}

/// Text message `id` with unique id `u{id}` in the test thread.
pub fn message(id: MessageId, time: Millis, sender: i64) -> Message {
    Message::text(
        Some(id),
        format!("u{id}"),
        THREAD,
        time,
        Some(user(sender)),
        format!("message {id}"),
    )
}

pub fn page(messages: Vec<Message>, has_next: bool) -> HistoryResponse {
    HistoryResponse {
        thread_id: THREAD,
        messages,
        has_next,
        from_cache: false,
    }
}

/// Group thread whose message `n` was sent at `n * 1000`.
pub fn thread(last_message_id: MessageId, last_seen_id: MessageId) -> ThreadInfo {
    ThreadInfo {
        id: THREAD,
        thread_type: ThreadType::Group,
        last_message_id: Some(last_message_id),
        last_message_time: Some(last_message_id as Millis * 1_000),
        last_seen_message_id: last_seen_id,
        last_seen_message_time: Some(last_seen_id as Millis * 1_000),
        unread_count: (last_message_id - last_seen_id).max(0) as u32,
    }
}

pub fn caught_up_thread() -> ThreadInfo {
    thread(10, 10)
}

/// An engine wired to a recording transport and a channel delegate.
pub struct Harness {
    pub engine: HistoryEngine,
    pub timers: mpsc::UnboundedReceiver<TimerEvent>,
    pub updates: mpsc::UnboundedReceiver<HistoryUpdate>,
    pub transport: Arc<RecordingTransport>,
    pub app_state: Arc<Mutex<AppState>>,
}

impl Harness {
    pub fn new(thread: ThreadInfo) -> Self {
        Self::with_config(thread, SyncConfig::default())
    }

    pub fn with_config(thread: ThreadInfo, config: SyncConfig) -> Self {
        let transport = Arc::new(RecordingTransport::default());
        let (delegate, updates) = ChannelDelegate::new();
        let app_state = AppState::shared(user(ME));
        let (engine, timers) = HistoryEngine::new(
            config,
            thread,
            app_state.clone(),
            transport.clone(),
            Arc::new(delegate),
        );
        Self {
            engine,
            timers,
            updates,
            transport,
            app_state,
        }
    }

    /// Drain every delegate callback received so far.
    pub fn updates(&mut self) -> Vec<HistoryUpdate> {
        let mut out = Vec::new();
        while let Ok(update) = self.updates.try_recv() {
            out.push(update);
        }
        out
    }

    pub fn last_history_request(&self) -> (String, HistoryRequest) {
        self.transport
            .history_requests()
            .pop()
            .expect("no history request issued")
    }

    pub async fn respond(&mut self, key: &str, messages: Vec<Message>, has_next: bool) {
        self.engine
            .handle_event(ChatEvent::History {
                key: key.to_string(),
                response: page(messages, has_next),
            })
            .await;
    }

    /// Message ids in display order; banners show up as `None`.
    pub fn ids(&self) -> Vec<Option<MessageId>> {
        self.engine
            .sections()
            .rows()
            .map(|(_, row)| if row.is_banner() { None } else { row.message.id })
            .collect()
    }

    /// Start a caught-up thread and load messages `ids` (time = id * 1000).
    pub async fn loaded(ids: impl IntoIterator<Item = MessageId>) -> Self {
        let mut harness = Self::new(caught_up_thread());
        harness.engine.start();
        let (key, _) = harness.last_history_request();
        let messages = ids.into_iter().map(|id| message(id, id as Millis * 1_000, 2)).collect();
        harness.respond(&key, messages, false).await;
        harness.transport.clear();
        harness.updates();
        harness
    }
}
