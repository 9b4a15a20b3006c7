//! TTS (Text-to-Speech) Module
//!
//! [`VoiceOutput`] turns text plus a language into speech on whichever
//! [`SynthesisPlatform`] was negotiated at startup. Platforms report progress
//! through an event channel; the engine turns the first event into the
//! result of `speak`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AgriError, AgriResult, Capability};
use crate::language::Language;
use crate::voices::{VoiceInfo, VoiceResolver};

pub mod espeak;
pub mod speechd;

/// Delivery parameters, held constant across calls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechDelivery {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for SpeechDelivery {
    fn default() -> Self {
        Self {
            rate: 0.9,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

impl From<&Config> for SpeechDelivery {
    fn from(config: &Config) -> Self {
        Self {
            rate: config.speech_rate,
            pitch: config.speech_pitch,
            volume: config.speech_volume,
        }
    }
}

/// One request handed to the platform
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    /// Unique per engine; used to withdraw an abandoned request
    pub id: u64,
    pub text: String,
    pub voice: Option<VoiceInfo>,
    pub delivery: SpeechDelivery,
}

/// Progress reported by a synthesis platform
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisEvent {
    /// The utterance finished playing
    End,
    /// The platform failed mid-utterance
    Error(String),
}

/// Trait for platform synthesis engines
#[async_trait]
pub trait SynthesisPlatform: Send + Sync + std::fmt::Debug {
    /// Voices currently installed; may be empty while the platform loads them
    async fn voices(&self) -> Vec<VoiceInfo>;

    /// One-time notification fired when the voice list changes
    fn voices_changed(&self) -> Option<oneshot::Receiver<()>> {
        None
    }

    /// Queue an utterance. Exactly one event should follow on `events`;
    /// send failures must be ignored since the caller may have gone away.
    fn submit(&self, utterance: Utterance, events: mpsc::UnboundedSender<SynthesisEvent>);

    /// Stop or dequeue the utterance with `id`, leaving the others alone
    fn withdraw(&self, id: u64);

    /// Stop the current utterance and discard everything queued
    fn cancel(&self);

    /// Get the engine name
    fn name(&self) -> &str;
}

/// Voice Output Engine
#[derive(Debug)]
pub struct VoiceOutput {
    backend: Option<(Arc<dyn SynthesisPlatform>, VoiceResolver)>,
    delivery: SpeechDelivery,
    cancel: watch::Sender<u64>,
    next_id: AtomicU64,
}

/// Withdraws the utterance if the caller stops waiting for it
struct InFlight<'a> {
    platform: &'a dyn SynthesisPlatform,
    id: u64,
    finished: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!("Withdrawing abandoned utterance {}", self.id);
            self.platform.withdraw(self.id);
        }
    }
}

impl VoiceOutput {
    pub async fn new(platform: Option<Arc<dyn SynthesisPlatform>>, delivery: SpeechDelivery) -> Self {
        let backend = match platform {
            Some(platform) => {
                let resolver = VoiceResolver::new(Arc::clone(&platform)).await;
                Some((platform, resolver))
            }
            None => None,
        };
        let (cancel, _rx) = watch::channel(0);
        Self {
            backend,
            delivery,
            cancel,
            next_id: AtomicU64::new(0),
        }
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn resolver(&self) -> Option<&VoiceResolver> {
        self.backend.as_ref().map(|(_, resolver)| resolver)
    }

    /// Speak `text` in `language`, completing when the platform finishes.
    ///
    /// Fails with `UnsupportedCapability` before any voice resolution when no
    /// platform is available, with `Synthesis` on a platform fault and with
    /// `Cancelled` when [`VoiceOutput::stop`] interrupts it.
    pub async fn speak(&self, text: &str, language: Language) -> AgriResult<()> {
        let Some((platform, resolver)) = &self.backend else {
            return Err(AgriError::UnsupportedCapability(Capability::Synthesis));
        };

        let voice = resolver.resolve(language);
        if voice.is_none() {
            warn!("⚠️ No voice available for {}, using platform default", language);
        }

        let utterance = Utterance {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            text: text.to_string(),
            voice,
            delivery: self.delivery,
        };

        let mut cancelled = self.cancel.subscribe();
        let (tx, mut rx) = mpsc::unbounded_channel();
        debug!("Submitting utterance to {}: '{}'", platform.name(), text);
        let mut in_flight = InFlight {
            platform: platform.as_ref(),
            id: utterance.id,
            finished: false,
        };
        platform.submit(utterance, tx);

        let result = tokio::select! {
            biased;
            _ = cancelled.changed() => Err(AgriError::Cancelled),
            event = rx.recv() => match event {
                Some(SynthesisEvent::End) => Ok(()),
                Some(SynthesisEvent::Error(msg)) => Err(AgriError::Synthesis(msg)),
                None => Err(AgriError::Synthesis(format!(
                    "{} dropped the utterance",
                    platform.name()
                ))),
            },
        };
        in_flight.finished = true;
        result
    }

    /// Cancel all speech; outstanding `speak` calls resolve with `Cancelled`
    pub fn stop(&self) {
        self.cancel.send_modify(|generation| *generation += 1);
        if let Some((platform, _)) = &self.backend {
            platform.cancel();
        }
    }
}

/// Factory to create the configured synthesis platform.
///
/// Returns `None` when the platform is not available on this machine.
pub async fn create_platform(config: &Config) -> Option<Arc<dyn SynthesisPlatform>> {
    info!("🛠️ Creating TTS platform: {}", config.tts_engine);
    let platform: Arc<dyn SynthesisPlatform> = match config.tts_engine.as_str() {
        "none" => return None,
        "speechd_ng" | "speechd" => {
            match speechd::SpeechdSynthesizer::connect(config.speechd_voices.clone()).await {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    warn!("  - speechd-ng unavailable: {}", e);
                    return None;
                }
            }
        }
        other => {
            if other != "espeak" {
                warn!("  - Unknown engine '{}', falling back to espeak", other);
            }
            match espeak::EspeakSynthesizer::probe(&config.espeak_binary).await {
                Ok(engine) => Arc::new(engine),
                Err(e) => {
                    warn!("  - espeak unavailable: {}", e);
                    return None;
                }
            }
        }
    };
    info!("✅ TTS platform '{}' initialized", platform.name());
    Some(platform)
}
