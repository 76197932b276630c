use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ContextSummary, LogEntry, ModelSize};

pub const CONSOLE_PATH_MESSAGE: &str = "/msg";
pub const CONSOLE_PATH_MESSAGE_SYNC: &str = "/msg_sync";
pub const CONSOLE_PATH_POLL: &str = "/poll";
pub const CONSOLE_PATH_PAUSE: &str = "/pause";
pub const CONSOLE_PATH_RESET: &str = "/reset";
pub const CONSOLE_PATH_REMOVE: &str = "/remove";
pub const CONSOLE_PATH_TRANSCRIBE: &str = "/transcribe";
pub const CONSOLE_PATH_UPLOAD: &str = "/upload";
pub const CONSOLE_PATH_IMPORT_KNOWLEDGE: &str = "/import_knowledge";
pub const CONSOLE_PATH_GET_SETTINGS: &str = "/getSettings";
pub const CONSOLE_PATH_SET_SETTINGS: &str = "/setSettings";
pub const CONSOLE_PATH_LOAD_CHATS: &str = "/loadChats";
pub const CONSOLE_PATH_EXPORT_CHAT: &str = "/exportChat";
pub const CONSOLE_PATH_WORK_DIR: &str = "/work_dir";
pub const CONSOLE_PATH_HEALTH: &str = "/ok";

pub(crate) const UNDEFINED_ERROR_MESSAGE: &str = "Undefined error.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollRequest {
    pub log_from: u64,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub log_version: u64,
    #[serde(default)]
    pub log_guid: String,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub log_progress: Option<String>,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub contexts: Vec<ContextSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub text: String,
    pub context: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseRequest {
    pub paused: bool,
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextRequest {
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadChatsRequest {
    pub chats: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadChatsResponse {
    #[serde(default)]
    pub ctxids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportChatRequest {
    pub ctxid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportChatResponse {
    pub ctxid: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileListResponse {
    #[serde(default)]
    pub filenames: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkDirResponse {
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsResponse {
    #[serde(default)]
    pub settings: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeRequest {
    pub audio_data: String,
    pub model_size: ModelSize,
    pub language: Option<String>,
    pub is_final: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscribeResponse {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}
