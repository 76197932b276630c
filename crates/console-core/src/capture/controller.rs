use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::CaptureConfig;

use super::{CaptureError, CaptureMachine, CaptureState, FinalizeOutcome, Transcriber};

/// Cooldown after each accepted toggle; clicks inside it are ignored.
#[derive(Debug, Clone)]
pub struct ClickDebounce {
    cooldown: Duration,
    last_accepted: Option<Instant>,
}

impl ClickDebounce {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: None,
        }
    }

    pub fn try_acquire(&mut self, now: Instant) -> bool {
        let cooling_down = self
            .last_accepted
            .is_some_and(|last| now.saturating_duration_since(last) < self.cooldown);
        if cooling_down {
            return false;
        }
        self.last_accepted = Some(now);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Started,
    Stopped,
    /// Inside the click cooldown.
    Debounced,
    /// A finished recording is still being transcribed.
    Busy,
}

/// The microphone button: one toggle starts or stops a recording.
pub struct MicrophoneController<T> {
    machine: CaptureMachine,
    debounce: ClickDebounce,
    transcriber: T,
}

impl<T> MicrophoneController<T>
where
    T: Transcriber,
{
    pub fn new(machine: CaptureMachine, debounce: ClickDebounce, transcriber: T) -> Self {
        Self {
            machine,
            debounce,
            transcriber,
        }
    }

    pub fn from_config(config: &CaptureConfig, transcriber: T) -> Self {
        Self::new(
            CaptureMachine::from_config(config),
            ClickDebounce::new(config.toggle_cooldown()),
            transcriber,
        )
    }

    pub fn state(&self) -> CaptureState {
        self.machine.state()
    }

    /// Access for the audio device callbacks (segments, amplitude windows).
    pub fn machine_mut(&mut self) -> &mut CaptureMachine {
        &mut self.machine
    }

    pub fn toggle(&mut self, now: Instant) -> ToggleOutcome {
        if !self.debounce.try_acquire(now) {
            debug!("microphone toggle debounced");
            return ToggleOutcome::Debounced;
        }
        match self.machine.state() {
            CaptureState::Idle => {
                self.machine.start();
                ToggleOutcome::Started
            }
            CaptureState::Recording => {
                self.machine.stop();
                ToggleOutcome::Stopped
            }
            CaptureState::Finalizing => ToggleOutcome::Busy,
        }
    }

    pub fn device_failed(&mut self, message: impl Into<String>) -> CaptureError {
        self.machine.device_failed(message)
    }

    pub async fn finish(&mut self) -> Result<FinalizeOutcome, CaptureError> {
        self.machine.finalize(&self.transcriber).await
    }
}
