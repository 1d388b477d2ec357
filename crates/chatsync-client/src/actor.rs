//! Single-writer task owning a [`HistoryEngine`].
//!
//! UI intents arrive as [`EngineCommand`]s on a bounded channel, SDK events
//! on an unbounded one and highlight expirations on a private timer channel.
//! The task handles one message at a time, so every store mutation is
//! serialized without locks. The deceleration gate is the only state written
//! from outside the task.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use chatsync_shared::types::{Message, MessageId, Millis, ThreadId, ThreadInfo};
use chatsync_shared::{ChatEvent, SyncError};

use crate::config::SyncConfig;
use crate::delegate::HistoryDelegate;
use crate::highlight::TimerEvent;
use crate::history::{HistoryEngine, StoreSnapshot};
use crate::scroll::ScrollMetrics;
use crate::state::AppState;
use crate::transport::ChatTransport;

/// Commands accepted by the thread history task.
#[derive(Debug)]
pub enum EngineCommand {
    Start,
    LoadMoreTop,
    LoadMoreBottom,
    MoveTo {
        message_id: MessageId,
        time: Millis,
        highlight: bool,
    },
    ScrollToBottom,
    Push(ChatEvent),
    ScrollChanged(ScrollMetrics),
    RowAppeared(String),
    RowDisappeared(String),
    AppendUploads(Vec<Message>),
    CancelUpload(String),
    Snapshot(oneshot::Sender<StoreSnapshot>),
    Shutdown,
}

/// Cloneable handle to a running thread history task.
#[derive(Clone)]
pub struct ThreadHistoryHandle {
    thread_id: ThreadId,
    commands: mpsc::Sender<EngineCommand>,
    deceleration: Arc<watch::Sender<bool>>,
}

impl ThreadHistoryHandle {
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    async fn send(&self, command: EngineCommand) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }

    pub async fn start(&self) -> Result<(), SyncError> {
        self.send(EngineCommand::Start).await
    }

    pub async fn load_more_top(&self) -> Result<(), SyncError> {
        self.send(EngineCommand::LoadMoreTop).await
    }

    pub async fn load_more_bottom(&self) -> Result<(), SyncError> {
        self.send(EngineCommand::LoadMoreBottom).await
    }

    pub async fn move_to(
        &self,
        message_id: MessageId,
        time: Millis,
        highlight: bool,
    ) -> Result<(), SyncError> {
        self.send(EngineCommand::MoveTo {
            message_id,
            time,
            highlight,
        })
        .await
    }

    pub async fn scroll_to_bottom(&self) -> Result<(), SyncError> {
        self.send(EngineCommand::ScrollToBottom).await
    }

    pub async fn push(&self, event: ChatEvent) -> Result<(), SyncError> {
        self.send(EngineCommand::Push(event)).await
    }

    pub async fn scroll_changed(&self, metrics: ScrollMetrics) -> Result<(), SyncError> {
        self.send(EngineCommand::ScrollChanged(metrics)).await
    }

    pub async fn row_appeared(&self, unique_id: impl Into<String>) -> Result<(), SyncError> {
        self.send(EngineCommand::RowAppeared(unique_id.into())).await
    }

    pub async fn row_disappeared(&self, unique_id: impl Into<String>) -> Result<(), SyncError> {
        self.send(EngineCommand::RowDisappeared(unique_id.into()))
            .await
    }

    pub async fn append_uploads(&self, messages: Vec<Message>) -> Result<(), SyncError> {
        self.send(EngineCommand::AppendUploads(messages)).await
    }

    pub async fn cancel_upload(&self, unique_id: impl Into<String>) -> Result<(), SyncError> {
        self.send(EngineCommand::CancelUpload(unique_id.into()))
            .await
    }

    /// Copy of the store as it is after every earlier command was handled.
    pub async fn snapshot(&self) -> Result<StoreSnapshot, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineCommand::Snapshot(tx)).await?;
        rx.await.map_err(|_| SyncError::ChannelClosed)
    }

    pub async fn shutdown(&self) -> Result<(), SyncError> {
        self.send(EngineCommand::Shutdown).await
    }

    /// Hold (`true`) or release merges while the list decelerates. Written
    /// directly so it takes effect even while a merge is waiting.
    pub fn set_decelerating(&self, decelerating: bool) {
        self.deceleration.send_replace(decelerating);
    }
}

/// Build an engine and spawn the task that owns it.
pub fn spawn_thread_history(
    config: SyncConfig,
    thread: ThreadInfo,
    app_state: Arc<Mutex<AppState>>,
    transport: Arc<dyn ChatTransport>,
    delegate: Arc<dyn HistoryDelegate>,
    events: mpsc::UnboundedReceiver<ChatEvent>,
) -> Result<ThreadHistoryHandle, SyncError> {
    config.validate()?;
    let (engine, timers) = HistoryEngine::new(config, thread, app_state, transport, delegate);
    spawn_engine(engine, timers, events)
}

/// Spawn the task for an already configured engine.
pub fn spawn_engine(
    engine: HistoryEngine,
    timers: mpsc::UnboundedReceiver<TimerEvent>,
    events: mpsc::UnboundedReceiver<ChatEvent>,
) -> Result<ThreadHistoryHandle, SyncError> {
    engine.config.validate()?;
    let (cmd_tx, cmd_rx) = mpsc::channel(engine.config.command_buffer);
    let handle = ThreadHistoryHandle {
        thread_id: engine.thread().id,
        commands: cmd_tx,
        deceleration: engine.deceleration_gate(),
    };
    tokio::spawn(run(engine, cmd_rx, events, timers));
    Ok(handle)
}

async fn run(
    mut engine: HistoryEngine,
    mut commands: mpsc::Receiver<EngineCommand>,
    mut events: mpsc::UnboundedReceiver<ChatEvent>,
    mut timers: mpsc::UnboundedReceiver<TimerEvent>,
) {
    let thread_id = engine.thread().id;
    info!(thread = thread_id, "thread history task started");

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(EngineCommand::Shutdown) | None => break,
                Some(command) => dispatch(&mut engine, command).await,
            },
            Some(event) = events.recv() => engine.handle_event(event).await,
            Some(timer) = timers.recv() => engine.handle_timer(timer),
        }
    }

    engine.close();
    info!(thread = thread_id, "thread history task stopped");
}

async fn dispatch(engine: &mut HistoryEngine, command: EngineCommand) {
    match command {
        EngineCommand::Start => engine.start(),
        EngineCommand::LoadMoreTop => engine.load_more_top(),
        EngineCommand::LoadMoreBottom => engine.load_more_bottom(),
        EngineCommand::MoveTo {
            message_id,
            time,
            highlight,
        } => engine.move_to(message_id, time, highlight),
        EngineCommand::ScrollToBottom => engine.scroll_to_bottom(),
        EngineCommand::Push(event) => engine.handle_event(event).await,
        EngineCommand::ScrollChanged(metrics) => engine.scroll_changed(metrics),
        EngineCommand::RowAppeared(unique_id) => engine.row_appeared(&unique_id),
        EngineCommand::RowDisappeared(unique_id) => engine.row_disappeared(&unique_id),
        EngineCommand::AppendUploads(messages) => engine.append_uploads(messages).await,
        EngineCommand::CancelUpload(unique_id) => engine.cancel_upload(&unique_id).await,
        EngineCommand::Snapshot(reply) => {
            if reply.send(engine.snapshot()).is_err() {
                debug!("snapshot requester went away");
            }
        }
        EngineCommand::Shutdown => {}
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::events::{ChannelDelegate, HistoryUpdate};
    use crate::testing::{caught_up_thread, message, page, RecordingTransport, ME};

    fn spawn(
        transport: Arc<RecordingTransport>,
    ) -> (
        ThreadHistoryHandle,
        mpsc::UnboundedSender<ChatEvent>,
        mpsc::UnboundedReceiver<HistoryUpdate>,
    ) {
        let (delegate, updates) = ChannelDelegate::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let app_state = AppState::shared(chatsync_shared::Participant { id: ME, name: None });
        let handle = spawn_thread_history(
            SyncConfig::default(),
            caught_up_thread(),
            app_state,
            transport,
            Arc::new(delegate),
            events_rx,
        )
        .unwrap();
        (handle, events_tx, updates)
    }

    #[tokio::test]
    async fn test_start_and_merge_through_the_task() {
        let transport = Arc::new(RecordingTransport::default());
        let (handle, events, _updates) = spawn(transport.clone());

        handle.start().await.unwrap();
        handle.snapshot().await.unwrap();
        let (key, request) = transport.history_requests().remove(0);
        assert_eq!(request.to_time, Some(caught_up_thread().last_seen_message_time.unwrap() + 1));

        events
            .send(ChatEvent::History {
                key,
                response: page(vec![message(9, 9_000, 2), message(10, 10_000, 2)], false),
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.sections.iter().map(|s| s.rows.len()).sum::<usize>(), 2);
        assert!(!snapshot.has_next_top);
        assert!(!snapshot.has_next_bottom);
    }

    #[tokio::test]
    async fn test_deceleration_gate_holds_merges() {
        let transport = Arc::new(RecordingTransport::default());
        let (handle, _events, _updates) = spawn(transport.clone());
        handle.start().await.unwrap();
        handle.snapshot().await.unwrap();
        let (key, _) = transport.history_requests().remove(0);

        handle.set_decelerating(true);
        handle
            .push(ChatEvent::History {
                key,
                response: page(vec![message(10, 10_000, 2)], false),
            })
            .await
            .unwrap();
        let held = tokio::time::timeout(Duration::from_millis(50), handle.snapshot()).await;
        assert!(held.is_err());

        handle.set_decelerating(false);
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.sections.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_the_handle() {
        let (handle, _events, _updates) = spawn(Arc::new(RecordingTransport::default()));
        handle.shutdown().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(matches!(
            handle.snapshot().await,
            Err(SyncError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_spawning() {
        let (delegate, _updates) = ChannelDelegate::new();
        let (_events_tx, events_rx) = mpsc::unbounded_channel();
        let config = SyncConfig {
            page_size: 0,
            ..Default::default()
        };
        let transport = Arc::new(RecordingTransport::default());
        let result = spawn_thread_history(
            config,
            caught_up_thread(),
            AppState::shared(chatsync_shared::Participant { id: ME, name: None }),
            transport.clone(),
            Arc::new(delegate),
            events_rx,
        );

        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
        assert!(transport.calls().is_empty());
    }
}
