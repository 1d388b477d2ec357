//! Session state shared by every open thread.
//!
//! The [`AppState`] struct is wrapped in `Arc<Mutex<>>` so that every thread
//! engine can read the current user and consume pending navigation requests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chatsync_shared::types::{ConnectionStatus, NavigationTarget, Participant, ThreadId};

/// Central session state.
pub struct AppState {
    /// The signed-in user; own messages are recognised by this id.
    pub current_user: Participant,

    /// Last connection status reported by the SDK.
    pub connection_status: ConnectionStatus,

    /// Navigation requested for the next opening of a thread, e.g. when
    /// returning from a detail screen to a specific message.
    pending_navigation: HashMap<ThreadId, NavigationTarget>,
}

impl AppState {
    pub fn new(current_user: Participant) -> Self {
        Self {
            current_user,
            connection_status: ConnectionStatus::Connecting,
            pending_navigation: HashMap::new(),
        }
    }

    pub fn shared(current_user: Participant) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new(current_user)))
    }

    pub fn request_navigation(&mut self, thread_id: ThreadId, target: NavigationTarget) {
        self.pending_navigation.insert(thread_id, target);
    }

    /// Consume the pending navigation for `thread_id`, if any.
    pub fn take_navigation(&mut self, thread_id: ThreadId) -> Option<NavigationTarget> {
        self.pending_navigation.remove(&thread_id)
    }
}

/// Lock the shared state, recovering from a poisoned mutex.
pub fn lock(state: &Mutex<AppState>) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("App state lock poisoned, recovering");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_is_taken_once() {
        let state = AppState::shared(Participant { id: 1, name: None });
        let target = NavigationTarget {
            message_id: 5,
            time: 500,
            highlight: true,
        };
        lock(&state).request_navigation(9, target.clone());

        assert_eq!(lock(&state).take_navigation(9), Some(target));
        assert_eq!(lock(&state).take_navigation(9), None);
    }
}
