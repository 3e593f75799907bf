//! Voice assistant session: speech capture with a spoken echo.

use std::sync::Arc;

use serde::Serialize;

use crate::device::{Permission, PermissionStatus, Permissions, SpeechRecognizer, SpeechSynthesizer};
use crate::error::{Error, Result};

pub const ECHO_PREFIX: &str = "You said: ";

#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub locale: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ListeningState {
    Idle,
    Listening,
}

/// Ownership of the speech engine. Releasing detaches listeners and destroys
/// the engine; it happens once, on `release` or on drop, whichever is first.
pub struct CaptureLease<R: SpeechRecognizer> {
    recognizer: Arc<R>,
    released: bool,
}

impl<R: SpeechRecognizer> CaptureLease<R> {
    fn new(recognizer: Arc<R>) -> Self {
        Self {
            recognizer,
            released: false,
        }
    }

    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        log::debug!("voice: releasing speech engine");
        self.recognizer.release();
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl<R: SpeechRecognizer> Drop for CaptureLease<R> {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceView {
    pub state: ListeningState,
    pub transcript: String,
    pub closed: bool,
}

pub struct VoiceSession<R: SpeechRecognizer, S: SpeechSynthesizer> {
    recognizer: Arc<R>,
    synthesizer: Arc<S>,
    config: VoiceConfig,
    state: ListeningState,
    transcript: String,
    lease: CaptureLease<R>,
}

impl<R: SpeechRecognizer, S: SpeechSynthesizer> VoiceSession<R, S> {
    /// Mount the session. The microphone permission is requested first; a
    /// denial leaves no session behind.
    pub async fn open<P: Permissions>(
        permissions: &P,
        recognizer: Arc<R>,
        synthesizer: Arc<S>,
        config: VoiceConfig,
    ) -> Result<Self> {
        match permissions.request(Permission::Microphone).await? {
            PermissionStatus::Granted => {}
            PermissionStatus::Denied => {
                log::info!("voice: microphone permission denied");
                return Err(Error::PermissionDenied(Permission::Microphone));
            }
        }
        Ok(Self {
            lease: CaptureLease::new(Arc::clone(&recognizer)),
            recognizer,
            synthesizer,
            config,
            state: ListeningState::Idle,
            transcript: String::new(),
        })
    }

    pub fn state(&self) -> ListeningState {
        self.state
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn is_closed(&self) -> bool {
        self.lease.is_released()
    }

    pub fn view(&self) -> VoiceView {
        VoiceView {
            state: self.state,
            transcript: self.transcript.clone(),
            closed: self.is_closed(),
        }
    }

    /// Start listening when idle, stop when listening.
    pub async fn toggle(&mut self) -> Result<ListeningState> {
        if self.is_closed() {
            return Err(Error::InvalidTransition("voice session is closed"));
        }
        match self.state {
            ListeningState::Idle => {
                self.transcript.clear();
                match self.recognizer.start(&self.config.locale).await {
                    Ok(()) => self.state = ListeningState::Listening,
                    Err(e) => log::warn!("voice: speech start failed: {e}"),
                }
            }
            ListeningState::Listening => {
                if let Err(e) = self.recognizer.stop().await {
                    log::warn!("voice: speech stop failed: {e}");
                }
                self.state = ListeningState::Idle;
            }
        }
        Ok(self.state)
    }

    pub fn on_speech_start(&mut self) {
        if !self.is_closed() {
            self.state = ListeningState::Listening;
        }
    }

    pub fn on_speech_end(&mut self) {
        if !self.is_closed() {
            self.state = ListeningState::Idle;
        }
    }

    /// Take the first recognition result as the transcript and speak it back.
    /// Returns the echoed text, or `None` when the event was ignored.
    pub async fn on_speech_results(&mut self, values: Vec<String>) -> Option<String> {
        if self.is_closed() {
            log::debug!("voice: results after close ignored");
            return None;
        }
        let text = values.into_iter().next()?;
        self.state = ListeningState::Idle;
        self.transcript = text;

        let echo = format!("{ECHO_PREFIX}{}", self.transcript);
        if let Err(e) = self.synthesizer.speak(&echo).await {
            log::warn!("voice: speak failed: {e}");
        }
        Some(echo)
    }

    /// Tear the session down. Safe to call more than once.
    pub fn close(&mut self) {
        self.state = ListeningState::Idle;
        self.lease.release();
    }
}
