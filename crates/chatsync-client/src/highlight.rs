//! Temporary emphasis of a row after a jump.
//!
//! At most one row is highlighted. Each highlight owns a timer task; a new
//! highlight aborts the previous timer so a stale expiry can never clear the
//! newer highlight.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::history::HistoryEngine;

/// Timer callbacks re-entering the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    HighlightExpired { unique_id: String },
}

#[derive(Debug, PartialEq, Eq)]
pub enum HighlightChange {
    /// Already highlighted; the running timer is kept.
    Unchanged,
    Started { previous: Option<String> },
}

struct ActiveHighlight {
    unique_id: String,
    timer: JoinHandle<()>,
}

pub struct HighlightController {
    duration: Duration,
    active: Option<ActiveHighlight>,
    timers: mpsc::UnboundedSender<TimerEvent>,
}

impl HighlightController {
    pub fn new(duration: Duration, timers: mpsc::UnboundedSender<TimerEvent>) -> Self {
        Self {
            duration,
            active: None,
            timers,
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.unique_id.as_str())
    }

    /// Highlight `unique_id`, replacing any previous highlight.
    pub fn begin(&mut self, unique_id: &str) -> HighlightChange {
        if self.current() == Some(unique_id) {
            return HighlightChange::Unchanged;
        }
        let previous = self.cancel();

        let deadline = Instant::now() + self.duration;
        let timers = self.timers.clone();
        let expired = unique_id.to_string();
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = timers.send(TimerEvent::HighlightExpired { unique_id: expired });
        });

        debug!(unique_id, "highlight started");
        self.active = Some(ActiveHighlight {
            unique_id: unique_id.to_string(),
            timer,
        });
        HighlightChange::Started { previous }
    }

    /// Clear the highlight if `unique_id` is still the highlighted row.
    pub fn expire(&mut self, unique_id: &str) -> bool {
        if self.current() != Some(unique_id) {
            return false;
        }
        self.active = None;
        debug!(unique_id, "highlight expired");
        true
    }

    /// Drop the current highlight and abort its timer.
    pub fn cancel(&mut self) -> Option<String> {
        let active = self.active.take()?;
        active.timer.abort();
        Some(active.unique_id)
    }
}

impl Drop for HighlightController {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl HistoryEngine {
    /// Highlight a row and notify the UI, un-highlighting the previous one.
    pub fn highlight(&mut self, unique_id: &str) {
        if let HighlightChange::Started { previous } = self.highlighter.begin(unique_id) {
            if let Some(previous) = previous {
                self.set_row_highlight(&previous, false);
            }
            self.set_row_highlight(unique_id, true);
        }
    }

    pub fn cancel_highlight(&mut self) {
        if let Some(previous) = self.highlighter.cancel() {
            self.set_row_highlight(&previous, false);
        }
    }

    pub fn handle_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::HighlightExpired { unique_id } => {
                if self.highlighter.expire(&unique_id) {
                    self.set_row_highlight(&unique_id, false);
                }
            }
        }
    }

    /// Rows move under concurrent inserts, so the position is looked up at
    /// the moment the flag changes.
    fn set_row_highlight(&mut self, unique_id: &str, on: bool) {
        let Some(at) = self.sections.index_path_by_unique_id(unique_id) else {
            return;
        };
        if let Some(row) = self.sections.row_mut(at) {
            row.highlighted = on;
        }
        self.delegate.set_highlight_row_at(at, on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expiry_fires_after_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut controller = HighlightController::new(Duration::from_millis(2_500), tx);
        assert_eq!(
            controller.begin("a"),
            HighlightChange::Started { previous: None }
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            TimerEvent::HighlightExpired {
                unique_id: "a".into()
            }
        );
        assert!(controller.expire("a"));
        assert_eq!(controller.current(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_highlight_cancels_first_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut controller = HighlightController::new(Duration::from_millis(2_500), tx);
        controller.begin("a");
        tokio::time::advance(Duration::from_millis(1_000)).await;
        assert_eq!(
            controller.begin("b"),
            HighlightChange::Started {
                previous: Some("a".into())
            }
        );

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        let first = rx.recv().await.unwrap();
        assert_eq!(
            first,
            TimerEvent::HighlightExpired {
                unique_id: "b".into()
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_highlight_is_noop() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut controller = HighlightController::new(Duration::from_millis(2_500), tx);
        controller.begin("a");
        assert_eq!(controller.begin("a"), HighlightChange::Unchanged);
        assert!(!controller.expire("b"));
        assert_eq!(controller.current(), Some("a"));
    }
}
