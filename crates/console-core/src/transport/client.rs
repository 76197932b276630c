use reqwest::RequestBuilder;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::IgnoredAny;
use serde_json::Value;

use crate::config::{BasicAuthCredentials, ClientConfig};
use crate::models::FileUpload;

use super::{
    ApiError, CONSOLE_PATH_EXPORT_CHAT, CONSOLE_PATH_GET_SETTINGS, CONSOLE_PATH_HEALTH,
    CONSOLE_PATH_IMPORT_KNOWLEDGE, CONSOLE_PATH_LOAD_CHATS, CONSOLE_PATH_MESSAGE,
    CONSOLE_PATH_MESSAGE_SYNC, CONSOLE_PATH_PAUSE, CONSOLE_PATH_POLL, CONSOLE_PATH_REMOVE,
    CONSOLE_PATH_RESET, CONSOLE_PATH_SET_SETTINGS, CONSOLE_PATH_TRANSCRIBE, CONSOLE_PATH_UPLOAD,
    CONSOLE_PATH_WORK_DIR, ContextRequest, ExportChatRequest, ExportChatResponse,
    FileListResponse, LoadChatsRequest, LoadChatsResponse, MessageRequest, MessageResponse,
    PauseRequest, PollRequest, PollResponse, SettingsResponse, TranscribeRequest,
    TranscribeResponse, TransportError, WorkDirResponse, decode_envelope,
};

/// HTTP client for the agent backend. Cheap to clone; clones share one
/// connection pool.
#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    basic_auth: Option<BasicAuthCredentials>,
    http_client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            basic_auth: None,
            http_client,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|err| TransportError::InvalidRequest {
                message: format!("failed to build backend http client: {err}"),
            })?;

        let client = Self::new(config.base_url.clone(), http_client);
        Ok(match config.basic_auth.clone() {
            Some(credentials) => client.with_basic_auth(credentials),
            None => client,
        })
    }

    pub fn with_basic_auth(mut self, credentials: BasicAuthCredentials) -> Self {
        self.basic_auth = Some(credentials);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POSTs `body` as JSON and returns the parsed JSON response. Network
    /// failures and non-2xx statuses are errors; retrying is up to the caller.
    pub async fn post_json<Req>(&self, path: &str, body: &Req) -> Result<Value, TransportError>
    where
        Req: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(body).map_err(|err| TransportError::InvalidRequest {
            message: format!("failed to serialize request payload: {err}"),
        })?;

        let request = self
            .authorize(self.http_client.post(self.url(path)))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        execute_json(request).await
    }

    pub async fn poll(&self, request: &PollRequest) -> Result<PollResponse, ApiError> {
        let value = self.post_json(CONSOLE_PATH_POLL, request).await?;
        decode_envelope(value)
    }

    /// Sends a user message. Plain text goes as JSON; once attachments are
    /// present the whole message is sent as multipart form data.
    pub async fn send_message(
        &self,
        request: &MessageRequest,
        attachments: &[FileUpload],
    ) -> Result<MessageResponse, ApiError> {
        if attachments.is_empty() {
            let value = self.post_json(CONSOLE_PATH_MESSAGE, request).await?;
            return decode_envelope(value);
        }

        let mut form = Form::new()
            .text("text", request.text.clone())
            .text("context", request.context.clone())
            .text("message_id", request.message_id.clone());
        for attachment in attachments {
            form = form.part("attachments", file_part(attachment)?);
        }

        let value = self.post_multipart(CONSOLE_PATH_MESSAGE, form).await?;
        decode_envelope(value)
    }

    /// Sends a message and waits for the agent to finish; the answer comes
    /// back in `message`.
    pub async fn send_message_sync(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, ApiError> {
        let value = self.post_json(CONSOLE_PATH_MESSAGE_SYNC, request).await?;
        decode_envelope(value)
    }

    pub async fn pause(&self, paused: bool, context: &str) -> Result<(), ApiError> {
        let request = PauseRequest {
            paused,
            context: context.to_string(),
        };
        let value = self.post_json(CONSOLE_PATH_PAUSE, &request).await?;
        decode_envelope::<IgnoredAny>(value).map(|_| ())
    }

    pub async fn reset(&self, context: &str) -> Result<(), ApiError> {
        let request = ContextRequest {
            context: context.to_string(),
        };
        let value = self.post_json(CONSOLE_PATH_RESET, &request).await?;
        decode_envelope::<IgnoredAny>(value).map(|_| ())
    }

    pub async fn remove(&self, context: &str) -> Result<(), ApiError> {
        let request = ContextRequest {
            context: context.to_string(),
        };
        let value = self.post_json(CONSOLE_PATH_REMOVE, &request).await?;
        decode_envelope::<IgnoredAny>(value).map(|_| ())
    }

    pub async fn load_chats(&self, chats: Vec<String>) -> Result<LoadChatsResponse, ApiError> {
        let value = self
            .post_json(CONSOLE_PATH_LOAD_CHATS, &LoadChatsRequest { chats })
            .await?;
        decode_envelope(value)
    }

    pub async fn export_chat(&self, ctxid: &str) -> Result<ExportChatResponse, ApiError> {
        let request = ExportChatRequest {
            ctxid: ctxid.to_string(),
        };
        let value = self.post_json(CONSOLE_PATH_EXPORT_CHAT, &request).await?;
        decode_envelope(value)
    }

    pub async fn upload(&self, files: &[FileUpload]) -> Result<Vec<String>, ApiError> {
        self.send_files(CONSOLE_PATH_UPLOAD, "file", files).await
    }

    pub async fn import_knowledge(&self, files: &[FileUpload]) -> Result<Vec<String>, ApiError> {
        self.send_files(CONSOLE_PATH_IMPORT_KNOWLEDGE, "files[]", files)
            .await
    }

    pub async fn get_settings(&self) -> Result<Value, ApiError> {
        let value = self
            .post_json(CONSOLE_PATH_GET_SETTINGS, &Value::Null)
            .await?;
        decode_envelope::<SettingsResponse>(value).map(|response| response.settings)
    }

    pub async fn set_settings(&self, settings: &Value) -> Result<Value, ApiError> {
        let value = self.post_json(CONSOLE_PATH_SET_SETTINGS, settings).await?;
        decode_envelope::<SettingsResponse>(value).map(|response| response.settings)
    }

    pub async fn list_work_dir(&self) -> Result<Vec<String>, ApiError> {
        let request = self.authorize(self.http_client.get(self.url(CONSOLE_PATH_WORK_DIR)));
        let value = execute_json(request).await?;
        decode_envelope::<WorkDirResponse>(value).map(|response| response.files)
    }

    /// Returns true when the backend answers its health check with `OK`.
    pub async fn health(&self) -> Result<bool, TransportError> {
        let response = self
            .authorize(self.http_client.get(self.url(CONSOLE_PATH_HEALTH)))
            .send()
            .await
            .map_err(|err| TransportError::Unavailable {
                message: err.to_string(),
            })?;

        if !response.status().is_success() {
            return Ok(false);
        }
        let body = response
            .text()
            .await
            .map_err(|err| TransportError::InvalidResponse {
                message: format!("failed to read health check body: {err}"),
            })?;
        Ok(body.trim() == "OK")
    }

    /// The transcription endpoint does not use the `{ok}` envelope; failures
    /// come back as non-2xx statuses carrying `{error, details}`.
    pub async fn transcribe(
        &self,
        request: &TranscribeRequest,
    ) -> Result<TranscribeResponse, TransportError> {
        let value = self.post_json(CONSOLE_PATH_TRANSCRIBE, request).await?;
        serde_json::from_value::<TranscribeResponse>(value).map_err(|err| {
            TransportError::InvalidResponse {
                message: format!("failed to decode transcription response: {err}"),
            }
        })
    }

    async fn send_files(
        &self,
        path: &str,
        field_name: &'static str,
        files: &[FileUpload],
    ) -> Result<Vec<String>, ApiError> {
        let mut form = Form::new();
        for file in files {
            form = form.part(field_name, file_part(file)?);
        }

        let value = self.post_multipart(path, form).await?;
        decode_envelope::<FileListResponse>(value).map(|response| response.filenames)
    }

    async fn post_multipart(&self, path: &str, form: Form) -> Result<Value, TransportError> {
        let request = self
            .authorize(self.http_client.post(self.url(path)))
            .multipart(form);
        execute_json(request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.basic_auth.as_ref() {
            Some(credentials) => {
                builder.basic_auth(&credentials.username, Some(&credentials.password))
            }
            None => builder,
        }
    }
}

async fn execute_json(request: RequestBuilder) -> Result<Value, TransportError> {
    let response = request
        .send()
        .await
        .map_err(|err| TransportError::Unavailable {
            message: err.to_string(),
        })?;

    let status = response.status();
    let bytes = response
        .bytes()
        .await
        .map_err(|err| TransportError::InvalidResponse {
            message: format!("failed to read backend response body: {err}"),
        })?;

    if !status.is_success() {
        return Err(TransportError::HttpStatus {
            status: status.as_u16(),
            message: error_body_message(&bytes),
        });
    }

    serde_json::from_slice::<Value>(&bytes).map_err(|err| TransportError::InvalidResponse {
        message: format!("failed to parse backend response: {err}"),
    })
}

fn error_body_message(bytes: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
        let field = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        match (field("message").or_else(|| field("error")), field("details")) {
            (Some(message), Some(details)) => return format!("{message}: {details}"),
            (Some(message), None) => return message,
            (None, _) => {}
        }
    }

    let text = String::from_utf8_lossy(bytes).trim().to_string();
    if text.is_empty() {
        "empty response body".to_string()
    } else {
        text
    }
}

fn file_part(file: &FileUpload) -> Result<Part, TransportError> {
    let part = Part::bytes(file.bytes.clone()).file_name(file.file_name.clone());
    match file.mime_type.as_deref() {
        Some(mime_type) => part
            .mime_str(mime_type)
            .map_err(|err| TransportError::InvalidRequest {
                message: format!("invalid mime type for {}: {err}", file.file_name),
            }),
        None => Ok(part),
    }
}
