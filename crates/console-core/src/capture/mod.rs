//! Voice input: `Idle -> Recording -> Finalizing -> Idle`.
//!
//! The machine does no IO of its own. The audio device hands it encoded
//! segments and amplitude windows; callers pass the current [`Instant`] so the
//! silence timer can be driven deterministically.

mod controller;
mod silence;
mod transcriber;

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

pub use controller::{ClickDebounce, MicrophoneController, ToggleOutcome};
pub use silence::{SilenceDetector, rms_energy};
pub use transcriber::{BackendTranscriber, TranscribeFuture, Transcriber};

use crate::config::CaptureConfig;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("microphone not initialized: {message}")]
    NotInitialized { message: String },
    #[error("transcription failed: {message}")]
    Transcription { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
    Finalizing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// The recording held no audio; nothing was transcribed.
    NoAudio,
    /// The transcriber heard nothing intelligible.
    Empty,
    /// Text for the caller. Produced at most once per recording, since
    /// finalize leaves `Finalizing` before it transcribes.
    Delivered(String),
    /// No recording was waiting to be finalized.
    Skipped,
}

#[derive(Debug)]
pub struct CaptureMachine {
    state: CaptureState,
    segments: Vec<Vec<u8>>,
    silence: SilenceDetector,
}

impl CaptureMachine {
    pub fn new(silence_threshold: f32, silence_duration: Duration) -> Self {
        Self {
            state: CaptureState::Idle,
            segments: Vec::new(),
            silence: SilenceDetector::new(silence_threshold, silence_duration),
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.silence_threshold, config.silence_duration())
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn buffered_segments(&self) -> usize {
        self.segments.len()
    }

    /// Begins a new recording. Only valid from `Idle`.
    pub fn start(&mut self) -> bool {
        if self.state != CaptureState::Idle {
            return false;
        }
        self.segments.clear();
        self.silence.cancel();
        self.state = CaptureState::Recording;
        debug!("capture started");
        true
    }

    /// Buffers an encoded audio chunk. Chunks keep arriving after `stop`
    /// until the device flushes, so they are accepted until finalize runs.
    pub fn push_segment(&mut self, segment: Vec<u8>) -> bool {
        if segment.is_empty() || self.state == CaptureState::Idle {
            return false;
        }
        self.segments.push(segment);
        true
    }

    /// Feeds one amplitude window. Returns true when sustained silence
    /// stopped the recording.
    pub fn sample(&mut self, window: &[f32], now: Instant) -> bool {
        if self.state != CaptureState::Recording {
            return false;
        }
        if self.silence.observe(rms_energy(window), now) {
            info!("sustained silence detected; stopping capture");
            return self.stop();
        }
        false
    }

    /// Fires the silence timer between samples.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.state != CaptureState::Recording || !self.silence.poll(now) {
            return false;
        }
        info!("sustained silence detected; stopping capture");
        self.stop()
    }

    /// Ends the recording. Repeated calls, from a click racing the silence
    /// timer, return false and change nothing.
    pub fn stop(&mut self) -> bool {
        if self.state != CaptureState::Recording {
            return false;
        }
        self.silence.cancel();
        self.state = CaptureState::Finalizing;
        debug!(segments = self.segments.len(), "capture stopped");
        true
    }

    /// Transcribes the buffered recording and returns to `Idle`, whatever
    /// the transcriber answers. The machine is already `Idle` while the
    /// transcriber runs, including when this future is dropped early.
    pub async fn finalize<T>(&mut self, transcriber: &T) -> Result<FinalizeOutcome, CaptureError>
    where
        T: Transcriber + ?Sized,
    {
        if self.state != CaptureState::Finalizing {
            return Ok(FinalizeOutcome::Skipped);
        }

        let segments = std::mem::take(&mut self.segments);
        self.state = CaptureState::Idle;
        if segments.is_empty() {
            debug!("capture ended without audio");
            return Ok(FinalizeOutcome::NoAudio);
        }

        let payload = segments.concat();
        let text = match transcriber.transcribe(&payload).await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "transcription failed");
                return Err(err);
            }
        };

        if text.is_empty() {
            return Ok(FinalizeOutcome::Empty);
        }
        Ok(FinalizeOutcome::Delivered(text))
    }

    /// Drops the recording after a device failure and reports it.
    pub fn device_failed(&mut self, message: impl Into<String>) -> CaptureError {
        self.abort();
        let err = CaptureError::NotInitialized {
            message: message.into(),
        };
        warn!(error = %err, "capture aborted");
        err
    }

    pub fn abort(&mut self) {
        self.segments.clear();
        self.silence.cancel();
        self.state = CaptureState::Idle;
    }
}
