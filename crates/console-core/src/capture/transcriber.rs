use std::future::Future;
use std::pin::Pin;

use base64::Engine as _;

use crate::config::CaptureConfig;
use crate::models::ModelSize;
use crate::transport::{BackendClient, TranscribeRequest};

use super::CaptureError;

pub type TranscribeFuture<'a> = Pin<Box<dyn Future<Output = Result<String, CaptureError>> + Send + 'a>>;

/// Turns one assembled recording into text. An empty string means nothing
/// intelligible was heard.
pub trait Transcriber: Send + Sync {
    fn transcribe<'a>(&'a self, audio: &'a [u8]) -> TranscribeFuture<'a>;
}

/// Sends recordings to the backend's `/transcribe` endpoint.
#[derive(Clone)]
pub struct BackendTranscriber {
    client: BackendClient,
    model_size: ModelSize,
    language: Option<String>,
}

impl BackendTranscriber {
    pub fn new(client: BackendClient, model_size: ModelSize, language: Option<String>) -> Self {
        Self {
            client,
            model_size,
            language,
        }
    }

    pub fn from_config(client: BackendClient, config: &CaptureConfig) -> Self {
        Self::new(client, config.model_size, config.language.clone())
    }
}

impl Transcriber for BackendTranscriber {
    fn transcribe<'a>(&'a self, audio: &'a [u8]) -> TranscribeFuture<'a> {
        Box::pin(async move {
            let request = TranscribeRequest {
                audio_data: base64::engine::general_purpose::STANDARD.encode(audio),
                model_size: self.model_size,
                language: self.language.clone(),
                is_final: true,
            };

            let response = self
                .client
                .transcribe(&request)
                .await
                .map_err(|err| CaptureError::Transcription {
                    message: err.to_string(),
                })?;

            if let Some(error) = response.error {
                let message = match response.details {
                    Some(details) => format!("{error}: {details}"),
                    None => error,
                };
                return Err(CaptureError::Transcription { message });
            }

            Ok(response.text.unwrap_or_default().trim().to_string())
        })
    }
}
