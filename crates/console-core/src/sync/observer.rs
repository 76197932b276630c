use std::sync::{Mutex, MutexGuard};

use crate::models::ContextSummary;

const IDLE_PROGRESS: &str = "Waiting for input";

/// Side-channel fields published by every applied poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollStatus {
    pub paused: bool,
    pub contexts: Vec<ContextSummary>,
    pub progress: String,
}

impl PollStatus {
    pub(crate) fn new(paused: bool, contexts: Vec<ContextSummary>, progress: Option<&str>) -> Self {
        let progress = progress
            .map(str::trim)
            .filter(|progress| !progress.is_empty())
            .unwrap_or(IDLE_PROGRESS)
            .to_string();
        Self {
            paused,
            contexts,
            progress,
        }
    }
}

pub trait SyncObserver: Send + Sync {
    fn connectivity_changed(&self, connected: bool);
    fn status_published(&self, status: &PollStatus);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// `None` until the first poll completes or fails.
    pub connected: Option<bool>,
    pub paused: bool,
    pub contexts: Vec<ContextSummary>,
    pub progress: String,
}

/// Keeps the latest published status for whoever renders it.
#[derive(Debug, Default)]
pub struct StatusBoard {
    state: Mutex<StatusSnapshot>,
}

impl StatusBoard {
    pub fn snapshot(&self) -> StatusSnapshot {
        self.lock_state().clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, StatusSnapshot> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl SyncObserver for StatusBoard {
    fn connectivity_changed(&self, connected: bool) {
        self.lock_state().connected = Some(connected);
    }

    fn status_published(&self, status: &PollStatus) {
        let mut state = self.lock_state();
        state.paused = status.paused;
        state.contexts = status.contexts.clone();
        state.progress = status.progress.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_progress_reads_as_waiting_for_input() {
        assert_eq!(PollStatus::new(false, Vec::new(), None).progress, IDLE_PROGRESS);
        assert_eq!(PollStatus::new(false, Vec::new(), Some("  ")).progress, IDLE_PROGRESS);
        assert_eq!(
            PollStatus::new(true, Vec::new(), Some("Agent 0: searching")).progress,
            "Agent 0: searching"
        );
    }

    #[test]
    fn status_board_tracks_latest_values() {
        let board = StatusBoard::default();
        assert_eq!(board.snapshot().connected, None);

        board.connectivity_changed(false);
        board.status_published(&PollStatus::new(true, Vec::new(), Some("working")));

        let snapshot = board.snapshot();
        assert_eq!(snapshot.connected, Some(false));
        assert!(snapshot.paused);
        assert_eq!(snapshot.progress, "working");
    }
}
