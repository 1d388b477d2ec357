//! Optimistic rows for messages the server has not acknowledged yet.
//!
//! Placeholders are merged like any other page. The sent ack and the
//! new-message push later find them by unique id and swap in the server copy
//! without removing the row.

use std::time::Instant;

use tracing::{info, warn};

use chatsync_shared::types::{Message, UploadState};

use crate::delegate::{InsertEdge, ScrollPosition};
use crate::history::HistoryEngine;

impl HistoryEngine {
    /// Show freshly queued uploads at the bottom of the list.
    pub async fn append_uploads(&mut self, mut messages: Vec<Message>) {
        if messages.is_empty() {
            return;
        }
        for message in &mut messages {
            message.id = None;
            if message.upload.is_none() {
                message.upload = Some(UploadState::Queued);
            }
        }
        let newest = messages
            .iter()
            .max_by_key(|m| m.time)
            .map(|m| m.unique_id.clone());

        let outcome = self.merge(messages, InsertEdge::Bottom).await;
        info!(
            thread = self.thread.id,
            count = outcome.inserted.len(),
            "upload placeholders added"
        );

        if let Some(unique_id) = newest {
            self.delegate
                .scroll_to(&unique_id, ScrollPosition::Bottom, true);
            self.scroll.disable_excessive_loading(Instant::now());
        }
        self.report_empty_state();
    }

    /// Abort an upload and drop its placeholder. Rows the server already
    /// acknowledged are left alone.
    pub async fn cancel_upload(&mut self, unique_id: &str) {
        if let Err(e) = self.transport.cancel_upload(unique_id) {
            warn!(unique_id, error = %e, "failed to cancel upload");
        }
        let is_placeholder = self
            .sections
            .index_path_by_unique_id(unique_id)
            .and_then(|at| self.sections.row(at))
            .is_some_and(|row| row.message.is_upload());
        if !is_placeholder {
            return;
        }
        info!(unique_id, "upload cancelled");
        self.on_deleted(None, Some(unique_id)).await;
    }
}
