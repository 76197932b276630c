//! User-facing actions of the console.
//!
//! Each action talks to the backend through [`BackendClient`], keeps the
//! [`SessionTracker`] in step with the context the backend answered with, and
//! reports its outcome through a [`Notifier`].

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::capture::{CaptureError, FinalizeOutcome, MicrophoneController, Transcriber};
use crate::models::FileUpload;
use crate::notify::{Notification, Notifier};
use crate::session::{KillChatPlan, SessionTracker};
use crate::transport::{ApiError, BackendClient, MessageRequest, TransportError};

#[derive(Debug, Clone, Error)]
pub enum VoiceMessageError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// An exported conversation with the file name it should be saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatExport {
    pub ctxid: String,
    pub file_name: String,
    pub content: String,
}

pub struct Console {
    client: BackendClient,
    session: SessionTracker,
    notifier: Arc<dyn Notifier>,
}

impl Console {
    pub fn new(client: BackendClient, session: SessionTracker, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            client,
            session,
            notifier,
        }
    }

    pub fn client(&self) -> &BackendClient {
        &self.client
    }

    pub fn session(&self) -> &SessionTracker {
        &self.session
    }

    /// Sends a user message to the active context. Returns the context the
    /// backend filed it under, or `None` when there was nothing to send.
    pub async fn send_message(
        &self,
        text: &str,
        attachments: &[FileUpload],
    ) -> Result<Option<String>, ApiError> {
        let text = text.trim();
        if text.is_empty() && attachments.is_empty() {
            return Ok(None);
        }

        let request = self.message_request(text);
        let response = self
            .report(self.client.send_message(&request, attachments).await)?;
        debug!(
            message_id = %request.message_id,
            context = %response.context,
            attachments = attachments.len(),
            "message accepted"
        );
        self.adopt_context(&response.context);
        Ok(Some(response.context))
    }

    /// Sends a message and waits for the agent's final answer.
    pub async fn send_message_sync(&self, text: &str) -> Result<String, ApiError> {
        let request = self.message_request(text.trim());
        let response = self.report(self.client.send_message_sync(&request).await)?;
        self.adopt_context(&response.context);
        Ok(response.message.unwrap_or_default())
    }

    pub async fn pause(&self, paused: bool) -> Result<(), ApiError> {
        let context = self.active_context();
        self.report(self.client.pause(paused, &context).await)
    }

    pub async fn reset(&self) -> Result<(), ApiError> {
        let context = self.active_context();
        self.report(self.client.reset(&context).await)
    }

    pub fn new_chat(&self) -> String {
        self.session.new_chat()
    }

    pub fn switch_context(&self, context: &str) -> bool {
        self.session.switch_to(context)
    }

    /// Closes a conversation locally and, when the backend listed it, asks
    /// the backend to drop it as well.
    pub async fn kill_chat(&self, context: &str) -> Result<KillChatPlan, ApiError> {
        let plan = self.session.kill_chat(context);
        if plan.remove_remote {
            self.report(self.client.remove(context).await)?;
        }
        Ok(plan)
    }

    /// Loads exported conversations; the first loaded one becomes active.
    pub async fn load_chats(&self, chats: Vec<String>) -> Result<Vec<String>, ApiError> {
        let response = self.report(self.client.load_chats(chats).await)?;
        if let Some(first) = response.ctxids.first() {
            self.session.switch_to(first);
        }
        self.notifier.notify(Notification::success("Chats loaded."));
        Ok(response.ctxids)
    }

    pub async fn export_chat(&self) -> Result<ChatExport, ApiError> {
        let context = self.active_context();
        let response = self.report(self.client.export_chat(&context).await)?;
        self.notifier
            .notify(Notification::success("Chat file exported."));
        Ok(ChatExport {
            file_name: format!("{}.json", response.ctxid),
            ctxid: response.ctxid,
            content: response.content,
        })
    }

    pub async fn upload(&self, files: &[FileUpload]) -> Result<Vec<String>, ApiError> {
        let saved = self.report(self.client.upload(files).await)?;
        self.notifier.notify(Notification::success(format!(
            "Files uploaded: {}",
            saved.join(", ")
        )));
        Ok(saved)
    }

    pub async fn import_knowledge(&self, files: &[FileUpload]) -> Result<Vec<String>, ApiError> {
        let imported = self.report(self.client.import_knowledge(files).await)?;
        self.notifier.notify(Notification::success(format!(
            "Knowledge files imported: {}",
            imported.join(", ")
        )));
        Ok(imported)
    }

    pub async fn get_settings(&self) -> Result<Value, ApiError> {
        self.report(self.client.get_settings().await)
    }

    pub async fn set_settings(&self, settings: &Value) -> Result<Value, ApiError> {
        self.report(self.client.set_settings(settings).await)
    }

    pub async fn list_work_dir(&self) -> Result<Vec<String>, ApiError> {
        self.report(self.client.list_work_dir().await)
    }

    pub async fn health(&self) -> Result<bool, TransportError> {
        self.client.health().await
    }

    /// Finalizes a stopped recording and sends the transcript as a message.
    /// Returns the transcript when one was sent.
    pub async fn finish_recording<T>(
        &self,
        microphone: &mut MicrophoneController<T>,
    ) -> Result<Option<String>, VoiceMessageError>
    where
        T: Transcriber,
    {
        let outcome = match microphone.finish().await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.report_capture_error(&err);
                return Err(err.into());
            }
        };

        match outcome {
            FinalizeOutcome::Delivered(text) => {
                self.send_message(&text, &[]).await?;
                Ok(Some(text))
            }
            FinalizeOutcome::Empty => {
                self.notifier
                    .notify(Notification::info("No speech detected."));
                Ok(None)
            }
            FinalizeOutcome::NoAudio | FinalizeOutcome::Skipped => Ok(None),
        }
    }

    /// Resets the microphone after the audio device failed to open or died
    /// mid-recording, and tells the user.
    pub fn microphone_failed<T>(
        &self,
        microphone: &mut MicrophoneController<T>,
        message: impl Into<String>,
    ) -> CaptureError
    where
        T: Transcriber,
    {
        let err = microphone.device_failed(message);
        self.report_capture_error(&err);
        err
    }

    pub fn report_capture_error(&self, err: &CaptureError) {
        self.notifier.notify(Notification::error(err.to_string()));
    }

    fn message_request(&self, text: &str) -> MessageRequest {
        MessageRequest {
            text: text.to_string(),
            context: self.active_context(),
            message_id: Uuid::new_v4().to_string(),
        }
    }

    fn adopt_context(&self, context: &str) {
        if !context.is_empty() {
            self.session.switch_to(context);
        }
    }

    fn active_context(&self) -> String {
        self.session.active_context().unwrap_or_default()
    }

    fn report<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(err) = result.as_ref() {
            self.notifier.notify(Notification::error(err.user_message()));
        }
        result
    }
}
