//! Incremental log replay driven by `/poll`.
//!
//! Every poll carries the replay cursor's version. The backend answers with the
//! current `(log_version, log_guid)` of the active context plus the entries
//! changed since `log_from`:
//! - a different `log_guid` means the log stream was replaced (reset or
//!   truncated conversation) and the rendered view is rebuilt from scratch;
//! - a different `log_version` means entries were appended or changed and are
//!   upserted by `sequence_no`;
//! - a response for a context that is no longer active is dropped whole.

mod observer;
mod sink;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

pub use observer::{PollStatus, StatusBoard, StatusSnapshot, SyncObserver};
pub use sink::{
    EntryRenderer, LogView, MessageSide, PlainTextRenderer, RenderSink, RenderedMessage,
    RendererRegistry,
};

use crate::session::{ReplayCursor, SessionTracker};
use crate::transport::{ApiError, BackendClient, PollRequest, PollResponse, TransportError};

pub type PollFuture<'a> =
    Pin<Box<dyn Future<Output = Result<PollResponse, ApiError>> + Send + 'a>>;

pub trait PollBackend: Send + Sync {
    fn poll<'a>(&'a self, request: PollRequest) -> PollFuture<'a>;
}

impl PollBackend for BackendClient {
    fn poll<'a>(&'a self, request: PollRequest) -> PollFuture<'a> {
        Box::pin(async move { BackendClient::poll(self, &request).await })
    }
}

#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("poll transport failed: {0}")]
    Transport(#[from] TransportError),
    #[error("poll rejected by backend: {message}")]
    Rejected { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Applied {
        /// New or changed entries were replayed into the sink.
        updated: bool,
        /// The backend reported a new log stream and the sink was cleared.
        stream_replaced: bool,
        entries: usize,
    },
    /// The response belonged to a context that is no longer active.
    Stale {
        response_context: String,
        active_context: String,
    },
}

impl SyncOutcome {
    pub fn updated(&self) -> bool {
        matches!(self, Self::Applied { updated: true, .. })
    }
}

pub struct LogSyncEngine<B> {
    backend: B,
    session: SessionTracker,
    sink: Arc<dyn RenderSink>,
    observer: Arc<dyn SyncObserver>,
}

impl<B> LogSyncEngine<B>
where
    B: PollBackend,
{
    pub fn new(
        backend: B,
        session: SessionTracker,
        sink: Arc<dyn RenderSink>,
        observer: Arc<dyn SyncObserver>,
    ) -> Self {
        Self {
            backend,
            session,
            sink,
            observer,
        }
    }

    pub fn session(&self) -> &SessionTracker {
        &self.session
    }

    /// Runs one poll round trip. The cursor only moves when a response for
    /// the active context has been fully applied.
    pub async fn sync_once(&self) -> Result<SyncOutcome, SyncError> {
        let request = self.session.poll_request();
        let response = match self.backend.poll(request).await {
            Ok(response) => response,
            Err(ApiError::Transport(err)) => {
                warn!(error = %err, "poll request failed");
                self.observer.connectivity_changed(false);
                return Err(SyncError::Transport(err));
            }
            Err(ApiError::Rejected { message }) => {
                warn!(message = %message, "poll rejected by backend");
                return Err(SyncError::Rejected { message });
            }
        };

        let outcome = self.apply(&response);
        if matches!(outcome, SyncOutcome::Applied { .. }) {
            self.observer.connectivity_changed(true);
            self.observer.status_published(&PollStatus::new(
                response.paused,
                response.contexts.clone(),
                response.log_progress.as_deref(),
            ));
        }
        Ok(outcome)
    }

    fn apply(&self, response: &PollResponse) -> SyncOutcome {
        let (stream_replaced, updated) = {
            let mut state = self.session.lock_state();

            if state.active_context.is_empty() && !response.context.is_empty() {
                state.switch_to(&response.context);
                info!(context = %response.context, "adopted backend context");
            }

            if let Some(stale) = stale_outcome(&state.active_context, response) {
                return stale;
            }

            let stream_replaced = state.cursor.log_guid != response.log_guid;
            if stream_replaced && !state.cursor.log_guid.is_empty() {
                info!(
                    context = %state.active_context,
                    previous_guid = %state.cursor.log_guid,
                    log_guid = %response.log_guid,
                    "log stream replaced; replaying conversation"
                );
            }
            let known_version = if stream_replaced {
                0
            } else {
                state.cursor.log_version
            };
            (stream_replaced, known_version != response.log_version)
        };

        // Sinks and renderers may read the session, so they run unlocked.
        if stream_replaced {
            self.sink.clear();
        }
        if updated {
            for entry in &response.logs {
                self.sink.upsert(entry);
            }
        }

        let mut state = self.session.lock_state();
        // A switch that landed while rendering leaves the cursor initial; the
        // next poll for the new context clears the view on its log guid.
        if let Some(stale) = stale_outcome(&state.active_context, response) {
            return stale;
        }
        state.known_contexts = response.contexts.clone();
        state.cursor = ReplayCursor {
            log_version: response.log_version,
            log_guid: response.log_guid.clone(),
        };

        SyncOutcome::Applied {
            updated,
            stream_replaced,
            entries: if updated { response.logs.len() } else { 0 },
        }
    }
}

fn stale_outcome(active_context: &str, response: &PollResponse) -> Option<SyncOutcome> {
    if response.context == active_context {
        return None;
    }
    debug!(
        response_context = %response.context,
        active_context = %active_context,
        "discarding stale poll result"
    );
    Some(SyncOutcome::Stale {
        response_context: response.context.clone(),
        active_context: active_context.to_string(),
    })
}
