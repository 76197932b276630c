mod client;
mod contract;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub use client::BackendClient;
pub use contract::{
    CONSOLE_PATH_EXPORT_CHAT, CONSOLE_PATH_GET_SETTINGS, CONSOLE_PATH_HEALTH,
    CONSOLE_PATH_IMPORT_KNOWLEDGE, CONSOLE_PATH_LOAD_CHATS, CONSOLE_PATH_MESSAGE,
    CONSOLE_PATH_MESSAGE_SYNC, CONSOLE_PATH_PAUSE, CONSOLE_PATH_POLL, CONSOLE_PATH_REMOVE,
    CONSOLE_PATH_RESET, CONSOLE_PATH_SET_SETTINGS, CONSOLE_PATH_TRANSCRIBE, CONSOLE_PATH_UPLOAD,
    CONSOLE_PATH_WORK_DIR, ContextRequest, ExportChatRequest, ExportChatResponse,
    FileListResponse, LoadChatsRequest, LoadChatsResponse, MessageRequest, MessageResponse,
    PauseRequest, PollRequest, PollResponse, SettingsResponse, TranscribeRequest,
    TranscribeResponse, WorkDirResponse,
};

use contract::UNDEFINED_ERROR_MESSAGE;

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("backend request could not be sent: {message}")]
    Unavailable { message: String },
    #[error("backend responded with status {status}: {message}")]
    HttpStatus { status: u16, message: String },
    #[error("backend response invalid: {message}")]
    InvalidResponse { message: String },
    #[error("backend request invalid: {message}")]
    InvalidRequest { message: String },
}

#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{message}")]
    Rejected { message: String },
}

impl ApiError {
    /// Text suitable for a user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(err) => err.to_string(),
            Self::Rejected { message } => message.clone(),
        }
    }
}

/// Checks the `{ok, message}` envelope every endpoint wraps its payload in and
/// decodes the remaining fields only when `ok` is true.
pub(crate) fn decode_envelope<Res>(value: Value) -> Result<Res, ApiError>
where
    Res: DeserializeOwned,
{
    let ok = value.get("ok").and_then(Value::as_bool).unwrap_or(false);
    if !ok {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .unwrap_or(UNDEFINED_ERROR_MESSAGE)
            .to_string();
        return Err(ApiError::Rejected { message });
    }

    serde_json::from_value::<Res>(value).map_err(|err| {
        ApiError::Transport(TransportError::InvalidResponse {
            message: format!("failed to decode backend payload: {err}"),
        })
    })
}
