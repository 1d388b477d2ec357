//! Reaction summaries for loaded messages.
//!
//! Summaries are requested in batches right after a page is merged. Every
//! requested id waits in a queue until a summary response covers it; ids the
//! server sent nothing for have lost all their reactions.

use std::collections::HashSet;

use tracing::{debug, warn};

use chatsync_shared::constants::KEY_REACTIONS;
use chatsync_shared::types::{MessageId, Reaction, ReactionSummary};

use crate::history::HistoryEngine;
use crate::request_tracker::RequestPurpose;
use crate::sections::IndexPath;

#[derive(Debug, Default)]
pub struct ReactionSync {
    awaiting: HashSet<MessageId>,
}

impl ReactionSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue ids for a summary request. Placeholders (non-positive ids) and
    /// ids already in flight are skipped; the ids that still need a request
    /// are returned.
    pub fn enqueue(&mut self, ids: impl IntoIterator<Item = MessageId>) -> Vec<MessageId> {
        ids.into_iter()
            .filter(|id| *id > 0)
            .filter(|id| self.awaiting.insert(*id))
            .collect()
    }

    /// Returns true when `id` was still awaited.
    pub fn resolve(&mut self, id: MessageId) -> bool {
        self.awaiting.remove(&id)
    }

    pub fn forget(&mut self, ids: &[MessageId]) {
        for id in ids {
            self.awaiting.remove(id);
        }
    }

    pub fn is_awaiting(&self, id: MessageId) -> bool {
        self.awaiting.contains(&id)
    }

    pub fn clear(&mut self) {
        self.awaiting.clear();
    }
}

impl HistoryEngine {
    /// Request summaries for the given messages in one batch.
    pub(crate) fn fetch_reactions(&mut self, ids: Vec<MessageId>) {
        let ids = self.reactions.enqueue(ids);
        if ids.is_empty() {
            return;
        }
        let key = self.tracker.track(
            KEY_REACTIONS,
            RequestPurpose::Reactions {
                message_ids: ids.clone(),
            },
        );
        if let Err(e) = self
            .transport
            .request_reaction_summaries(&key, self.thread.id, &ids)
        {
            warn!(key = %key, error = %e, "reaction request failed to send");
            self.tracker.pop(&key);
            self.reactions.forget(&ids);
        }
    }

    pub(crate) fn on_reaction_summaries(&mut self, key: &str, summaries: Vec<ReactionSummary>) {
        let Some(tracked) = self.tracker.pop(key) else {
            debug!(key, "dropping stale reaction summaries");
            return;
        };
        let RequestPurpose::Reactions { message_ids } = tracked.purpose else {
            return;
        };

        let mut changed = Vec::new();
        for summary in summaries {
            self.reactions.resolve(summary.message_id);
            let Some(at) = self.sections.index_path_by_message_id(summary.message_id) else {
                continue;
            };
            if let Some(row) = self.sections.row_mut(at) {
                row.reactions = (!summary.is_empty()).then_some(summary);
                row.reactions_stale = false;
                changed.push(at);
            }
        }

        // No data for an id means its reactions were all removed.
        for id in message_ids {
            if !self.reactions.resolve(id) {
                continue;
            }
            let Some(at) = self.sections.index_path_by_message_id(id) else {
                continue;
            };
            if let Some(row) = self.sections.row_mut(at) {
                row.reactions_stale = false;
                if row.reactions.take().is_some() {
                    changed.push(at);
                }
            }
        }

        debug!(key, rows = changed.len(), "reaction summaries applied");
        if !changed.is_empty() {
            changed.sort();
            changed.dedup();
            self.delegate.reload_data(changed);
        }
    }

    pub(crate) fn on_reaction_added(&mut self, message_id: MessageId, reaction: Reaction) {
        let current_user_id = self.current_user_id;
        self.update_reactions(message_id, |summary| {
            summary.increment(&reaction.emoji);
            if reaction.participant.id == current_user_id {
                summary.current_user_reaction = Some(reaction);
            }
        });
    }

    pub(crate) fn on_reaction_replaced(
        &mut self,
        message_id: MessageId,
        old_emoji: &str,
        reaction: Reaction,
    ) {
        let current_user_id = self.current_user_id;
        self.update_reactions(message_id, |summary| {
            summary.decrement(old_emoji);
            summary.increment(&reaction.emoji);
            if reaction.participant.id == current_user_id {
                summary.current_user_reaction = Some(reaction);
            }
        });
    }

    pub(crate) fn on_reaction_removed(&mut self, message_id: MessageId, reaction: Reaction) {
        let current_user_id = self.current_user_id;
        self.update_reactions(message_id, |summary| {
            summary.decrement(&reaction.emoji);
            if reaction.participant.id == current_user_id {
                summary.current_user_reaction = None;
            }
        });
    }

    fn update_reactions(&mut self, message_id: MessageId, apply: impl FnOnce(&mut ReactionSummary)) {
        let Some(at) = self.sections.index_path_by_message_id(message_id) else {
            return;
        };
        let Some(row) = self.sections.row_mut(at) else {
            return;
        };
        let mut summary = row
            .reactions
            .take()
            .unwrap_or_else(|| ReactionSummary::empty(message_id));
        apply(&mut summary);
        let keep = !summary.is_empty() || summary.current_user_reaction.is_some();
        row.reactions = keep.then_some(summary);
        self.delegate.reload_data(vec![at]);
    }

    /// Mark every loaded row's reactions as outdated. They are fetched again
    /// when the row next becomes visible or on reconnect.
    pub(crate) fn invalidate_reactions(&mut self) {
        self.reactions.clear();
        let paths: Vec<IndexPath> = self
            .sections
            .rows()
            .filter(|(_, row)| row.message.server_id().is_some())
            .map(|(ip, _)| ip)
            .collect();
        for at in &paths {
            if let Some(row) = self.sections.row_mut(*at) {
                row.reactions_stale = true;
            }
        }
        debug!(rows = paths.len(), "reaction cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_skips_placeholders_and_in_flight() {
        let mut sync = ReactionSync::new();
        assert_eq!(sync.enqueue(vec![1, -3, 0, 2]), vec![1, 2]);
        assert_eq!(sync.enqueue(vec![2, 3]), vec![3]);
        assert!(sync.resolve(2));
        assert!(!sync.resolve(2));
        assert!(sync.is_awaiting(1));
    }
}
