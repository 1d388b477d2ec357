//! Bootstrap scenario selection.
//!
//! Opening a thread populates the store using exactly one strategy. The
//! choice depends only on the thread metadata and any pending navigation
//! target, so it is a pure function and tested in isolation.

use chatsync_shared::types::{MessageId, Millis, NavigationTarget, ThreadInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapScenario {
    /// Unread messages exist: top page up to the last seen message, then
    /// the page after it with an unread banner in between.
    UnreadGap { last_seen_time: Millis },
    /// Nothing newer than the last seen message.
    CaughtUp { last_seen_time: Millis },
    /// Last seen is ahead of the last message; fall back to offset paging.
    Corrupted,
    /// Never opened, but messages exist: open at the last one.
    NewlyAdded { message_id: MessageId, time: Millis },
    /// Never opened and empty.
    BrandNewEmpty,
    /// Process-wide navigation asked to open at a specific message.
    DeferredNavigation(NavigationTarget),
}

impl BootstrapScenario {
    /// Stable numbering used in logs.
    pub fn number(&self) -> u8 {
        match self {
            Self::UnreadGap { .. } => 1,
            Self::CaughtUp { .. } => 2,
            Self::Corrupted => 7,
            Self::NewlyAdded { .. } => 8,
            Self::BrandNewEmpty => 9,
            Self::DeferredNavigation(_) => 10,
        }
    }
}

pub fn select_scenario(
    thread: &ThreadInfo,
    deferred: Option<NavigationTarget>,
) -> BootstrapScenario {
    if let Some(target) = deferred {
        return BootstrapScenario::DeferredNavigation(target);
    }

    let never_opened = thread.last_seen_message_id == 0 && thread.last_seen_message_time.is_none();
    if never_opened {
        return match (thread.last_message_id, thread.last_message_time) {
            (Some(message_id), Some(time)) => BootstrapScenario::NewlyAdded { message_id, time },
            _ => BootstrapScenario::BrandNewEmpty,
        };
    }

    let Some(last_seen_time) = thread.last_seen_message_time else {
        return BootstrapScenario::Corrupted;
    };
    let last_message_id = thread.last_message_id.unwrap_or(0);

    match last_message_id.cmp(&thread.last_seen_message_id) {
        std::cmp::Ordering::Greater => BootstrapScenario::UnreadGap { last_seen_time },
        std::cmp::Ordering::Equal => BootstrapScenario::CaughtUp { last_seen_time },
        std::cmp::Ordering::Less => BootstrapScenario::Corrupted,
    }
}
