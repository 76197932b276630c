//! Active conversation tracking.
//!
//! The tracker is the freshness token for everything the poll loop applies:
//! results are compared against the context that is active when they arrive,
//! not the one that was active when the request went out.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;
use uuid::Uuid;

use crate::models::ContextSummary;
use crate::transport::PollRequest;

/// Position of the local replay within the server's log stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayCursor {
    pub log_version: u64,
    pub log_guid: String,
}

impl ReplayCursor {
    pub fn is_initial(&self) -> bool {
        self.log_version == 0 && self.log_guid.is_empty()
    }
}

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) active_context: String,
    pub(crate) cursor: ReplayCursor,
    pub(crate) known_contexts: Vec<ContextSummary>,
}

impl SessionState {
    pub(crate) fn switch_to(&mut self, context: &str) -> bool {
        if self.active_context == context {
            return false;
        }
        self.active_context = context.to_string();
        self.cursor = ReplayCursor::default();
        true
    }
}

/// Result of closing a conversation with [`SessionTracker::kill_chat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillChatPlan {
    /// Whether the backend knows the context and should be asked to remove it.
    pub remove_remote: bool,
    /// The context that became active, if the killed one was active.
    pub switched_to: Option<String>,
}

#[derive(Clone, Default)]
pub struct SessionTracker {
    state: Arc<Mutex<SessionState>>,
}

impl SessionTracker {
    pub fn new(initial_context: Option<String>) -> Self {
        let tracker = Self::default();
        if let Some(context) = initial_context {
            tracker.lock_state().active_context = context;
        }
        tracker
    }

    pub fn active_context(&self) -> Option<String> {
        let state = self.lock_state();
        if state.active_context.is_empty() {
            None
        } else {
            Some(state.active_context.clone())
        }
    }

    pub fn cursor(&self) -> ReplayCursor {
        self.lock_state().cursor.clone()
    }

    /// Contexts listed by the most recently applied poll.
    pub fn known_contexts(&self) -> Vec<ContextSummary> {
        self.lock_state().known_contexts.clone()
    }

    /// Makes `context` active. Switching to a different id resets the replay
    /// cursor; switching to the current id changes nothing.
    pub fn switch_to(&self, context: &str) -> bool {
        let switched = self.lock_state().switch_to(context);
        if switched {
            debug!(context = %context, "switched active context");
        }
        switched
    }

    /// Starts a fresh conversation under a random id and returns it.
    pub fn new_chat(&self) -> String {
        let context = Uuid::new_v4().to_string();
        self.switch_to(&context);
        context
    }

    pub fn kill_chat(&self, context: &str) -> KillChatPlan {
        let mut state = self.lock_state();
        let listed = state.known_contexts.iter().any(|known| known.id == context);
        let mut switched_to = None;

        if listed && state.active_context == context {
            let next = state
                .known_contexts
                .iter()
                .find(|known| known.id != context)
                .map(|known| known.id.clone())
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            state.switch_to(&next);
            switched_to = Some(next);
        }

        if listed {
            state.known_contexts.retain(|known| known.id != context);
        }

        KillChatPlan {
            remove_remote: listed,
            switched_to,
        }
    }

    pub(crate) fn poll_request(&self) -> PollRequest {
        let state = self.lock_state();
        PollRequest {
            log_from: state.cursor.log_version,
            context: state.active_context.clone(),
        }
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
