use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use crate::models::LogEntry;

/// Destination of replayed log entries.
pub trait RenderSink: Send + Sync {
    /// Drops everything rendered so far; a full replay follows.
    fn clear(&self);
    /// Replaces the entry with the same `sequence_no`, or appends it.
    fn upsert(&self, entry: &LogEntry);
}

pub trait EntryRenderer: Send + Sync {
    fn render(&self, entry: &LogEntry) -> String;
}

impl<F> EntryRenderer for F
where
    F: Fn(&LogEntry) -> String + Send + Sync,
{
    fn render(&self, entry: &LogEntry) -> String {
        self(entry)
    }
}

/// Heading, content, then one `key: value` line per kv pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer;

impl EntryRenderer for PlainTextRenderer {
    fn render(&self, entry: &LogEntry) -> String {
        let mut body = String::new();
        if !entry.heading.is_empty() {
            body.push_str(&entry.heading);
        }
        if !entry.content.is_empty() {
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(&entry.content);
        }
        if let Some(kv_pairs) = entry.kv_pairs.as_ref() {
            for (key, value) in kv_pairs {
                if !body.is_empty() {
                    body.push('\n');
                }
                match value {
                    Value::String(text) => {
                        let _ = write!(body, "{key}: {text}");
                    }
                    other => {
                        let _ = write!(body, "{key}: {other}");
                    }
                }
            }
        }
        body
    }
}

/// Maps an entry `type` tag to the renderer for it.
#[derive(Clone)]
pub struct RendererRegistry {
    renderers: HashMap<String, Arc<dyn EntryRenderer>>,
    fallback: Arc<dyn EntryRenderer>,
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::new(Arc::new(PlainTextRenderer))
    }
}

impl RendererRegistry {
    pub fn new(fallback: Arc<dyn EntryRenderer>) -> Self {
        Self {
            renderers: HashMap::new(),
            fallback,
        }
    }

    pub fn register(&mut self, kind: impl Into<String>, renderer: Arc<dyn EntryRenderer>) {
        self.renderers.insert(kind.into(), renderer);
    }

    pub fn with_renderer(mut self, kind: impl Into<String>, renderer: Arc<dyn EntryRenderer>) -> Self {
        self.register(kind, renderer);
        self
    }

    pub fn renderer_for(&self, kind: &str) -> &dyn EntryRenderer {
        match self.renderers.get(kind) {
            Some(renderer) => renderer.as_ref(),
            None => self.fallback.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSide {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub sequence_no: u64,
    pub kind: String,
    pub side: MessageSide,
    pub is_temporary: bool,
    pub body: String,
}

#[derive(Debug, Default)]
struct LogViewState {
    messages: Vec<RenderedMessage>,
    index: HashMap<u64, usize>,
}

/// In-memory conversation view keyed by `sequence_no`.
pub struct LogView {
    registry: RendererRegistry,
    state: Mutex<LogViewState>,
}

impl Default for LogView {
    fn default() -> Self {
        Self::new(RendererRegistry::default())
    }
}

impl LogView {
    pub fn new(registry: RendererRegistry) -> Self {
        Self {
            registry,
            state: Mutex::new(LogViewState::default()),
        }
    }

    pub fn messages(&self) -> Vec<RenderedMessage> {
        self.lock_state().messages.clone()
    }

    pub fn get(&self, sequence_no: u64) -> Option<RenderedMessage> {
        let state = self.lock_state();
        state
            .index
            .get(&sequence_no)
            .map(|position| state.messages[*position].clone())
    }

    pub fn len(&self) -> usize {
        self.lock_state().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn render(&self, entry: &LogEntry) -> RenderedMessage {
        RenderedMessage {
            sequence_no: entry.sequence_no,
            kind: entry.kind.clone(),
            side: if entry.is_user() {
                MessageSide::User
            } else {
                MessageSide::Agent
            },
            is_temporary: entry.is_temporary,
            body: self.registry.renderer_for(&entry.kind).render(entry),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LogViewState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl RenderSink for LogView {
    fn clear(&self) {
        let mut state = self.lock_state();
        state.messages.clear();
        state.index.clear();
    }

    fn upsert(&self, entry: &LogEntry) {
        let rendered = self.render(entry);
        let mut state = self.lock_state();
        match state.index.get(&entry.sequence_no).copied() {
            Some(position) => state.messages[position] = rendered,
            None => {
                let position = state.messages.len();
                state.index.insert(entry.sequence_no, position);
                state.messages.push(rendered);
            }
        }
    }
}
