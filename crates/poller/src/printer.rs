use std::io::Write as _;

use console_core::models::LogEntry;
use console_core::sync::{
    LogView, MessageSide, PollStatus, RenderSink, RenderedMessage, StatusBoard, SyncObserver,
};
use tracing::{info, warn};

/// Prints replayed entries to stdout. An entry is printed again only when
/// its rendered text changes.
#[derive(Default)]
pub struct TerminalSink {
    view: LogView,
}

impl RenderSink for TerminalSink {
    fn clear(&self) {
        self.view.clear();
        print_line("---- conversation replaced ----");
    }

    fn upsert(&self, entry: &LogEntry) {
        let previous = self.view.get(entry.sequence_no);
        self.view.upsert(entry);
        let Some(current) = self.view.get(entry.sequence_no) else {
            return;
        };
        if previous.as_ref() != Some(&current) {
            print_line(&format_message(&current));
        }
    }
}

fn print_line(line: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{line}");
}

fn format_message(message: &RenderedMessage) -> String {
    let speaker = match message.side {
        MessageSide::User => "you",
        MessageSide::Agent => message.kind.as_str(),
    };
    let marker = if message.is_temporary { " …" } else { "" };
    format!(
        "[{} {}{}] {}",
        message.sequence_no, speaker, marker, message.body
    )
}

/// Logs connectivity transitions and progress changes.
#[derive(Default)]
pub struct StatusLogger {
    board: StatusBoard,
}

impl SyncObserver for StatusLogger {
    fn connectivity_changed(&self, connected: bool) {
        let previous = self.board.snapshot().connected;
        self.board.connectivity_changed(connected);
        match (previous, connected) {
            (Some(true), false) | (None, false) => warn!("backend disconnected"),
            (Some(false), true) | (None, true) => info!("backend connected"),
            _ => {}
        }
    }

    fn status_published(&self, status: &PollStatus) {
        let previous = self.board.snapshot();
        self.board.status_published(status);
        if previous.progress != status.progress || previous.paused != status.paused {
            info!(
                paused = status.paused,
                contexts = status.contexts.len(),
                "{}",
                status.progress
            );
        }
    }
}
