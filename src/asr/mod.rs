//! ASR (Automatic Speech Recognition) Module
//!
//! [`VoiceInput`] captures a single utterance on the negotiated
//! [`RecognitionPlatform`] and returns its transcript. Backends:
//! - Wyoming: remote ASR protocol (e.g., faster-whisper), fed by an [`AudioSource`]

pub mod source;
pub mod wyoming;

pub use source::{AudioSource, PcmFileSource};
pub use wyoming::{WyomingClient, WyomingRecognizer};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AgriError, AgriResult, Capability};
use crate::language::Language;

/// Recognizer session settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizerSettings {
    pub locale: String,
    pub continuous: bool,
    pub interim_results: bool,
}

impl RecognizerSettings {
    /// Single-shot capture for `language`
    pub fn single_shot(language: Language) -> Self {
        Self {
            locale: language.recognizer_locale().to_string(),
            continuous: false,
            interim_results: false,
        }
    }
}

/// Progress reported by a recognition platform
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    Result { transcript: String, is_final: bool },
    Error(String),
    /// The session ended; nothing more will follow
    End,
}

/// Trait for platform recognizers
pub trait RecognitionPlatform: Send + Sync + std::fmt::Debug {
    /// Begin a capture session reporting on `events`; send failures must be ignored
    fn start(
        &self,
        settings: RecognizerSettings,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> anyhow::Result<()>;

    /// Abort the active session, if any
    fn stop(&self);

    /// Get the engine name
    fn name(&self) -> &str;
}

/// Voice Input Engine
#[derive(Debug)]
pub struct VoiceInput {
    platform: Option<Arc<dyn RecognitionPlatform>>,
    active: AtomicBool,
    cancel: watch::Sender<u64>,
}

/// Clears the active flag, and stops the platform if the caller walked away
struct Session<'a> {
    active: &'a AtomicBool,
    platform: &'a dyn RecognitionPlatform,
    finished: bool,
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.platform.stop();
        }
        self.active.store(false, Ordering::SeqCst);
    }
}

impl VoiceInput {
    pub fn new(platform: Option<Arc<dyn RecognitionPlatform>>) -> Self {
        let (cancel, _rx) = watch::channel(0);
        Self {
            platform,
            active: AtomicBool::new(false),
            cancel,
        }
    }

    pub fn is_available(&self) -> bool {
        self.platform.is_some()
    }

    pub fn is_listening(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Capture one utterance in `language` and return the first final transcript.
    ///
    /// Only one capture may run at a time; a second call fails with `Busy`
    /// instead of being queued.
    pub async fn listen(&self, language: Language) -> AgriResult<String> {
        let Some(platform) = &self.platform else {
            return Err(AgriError::UnsupportedCapability(Capability::Recognition));
        };

        if self.active.swap(true, Ordering::SeqCst) {
            return Err(AgriError::Busy(Capability::Recognition));
        }
        let mut session = Session {
            active: &self.active,
            platform: platform.as_ref(),
            finished: false,
        };

        let settings = RecognizerSettings::single_shot(language);
        debug!("Listening via {} ({})", platform.name(), settings.locale);

        let mut cancelled = self.cancel.subscribe();
        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Err(e) = platform.start(settings, tx) {
            session.finished = true;
            return Err(AgriError::Recognition(e.to_string()));
        }

        let result = loop {
            tokio::select! {
                biased;
                _ = cancelled.changed() => break Err(AgriError::Cancelled),
                event = rx.recv() => match event {
                    Some(RecognitionEvent::Result { transcript, is_final: true }) => {
                        break Ok(transcript);
                    }
                    Some(RecognitionEvent::Result { is_final: false, .. }) => continue,
                    Some(RecognitionEvent::Error(msg)) => break Err(AgriError::Recognition(msg)),
                    Some(RecognitionEvent::End) | None => {
                        break Err(AgriError::Recognition("no speech recognized".to_string()));
                    }
                },
            }
        };

        session.finished = true;
        if let Ok(transcript) = &result {
            info!("📝 Heard: '{}'", transcript);
        }
        result
    }

    /// Abort the capture; an outstanding `listen` resolves with `Cancelled`
    pub fn stop(&self) {
        self.cancel.send_modify(|generation| *generation += 1);
        if let Some(platform) = &self.platform {
            platform.stop();
        }
    }
}

/// Factory to create the configured recognition platform.
///
/// Returns `None` when the recognizer cannot be reached.
pub async fn create_platform(config: &Config) -> Option<Arc<dyn RecognitionPlatform>> {
    match config.asr_engine.as_str() {
        "none" => None,
        other => {
            if other != "wyoming" {
                warn!("Unknown ASR engine '{}', falling back to Wyoming", other);
            }
            let client = WyomingClient::new(&config.wyoming_host, config.wyoming_port);
            if !client.health_check().await {
                return None;
            }
            let source = Arc::new(PcmFileSource::new(&config.audio_input));
            Some(Arc::new(WyomingRecognizer::new(client, source)))
        }
    }
}
