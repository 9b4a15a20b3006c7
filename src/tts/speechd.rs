//! Speechd-ng TTS backend using D-Bus
//!
//! The service exposes no voice listing, so the inventory comes from the
//! `speechd_voices` config entry. With none configured every utterance uses
//! the service's default voice.

use super::{SynthesisEvent, SynthesisPlatform, Utterance};
use crate::voices::VoiceInfo;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zbus::{proxy, Connection};

#[proxy(
    interface = "org.speech.Service",
    default_service = "org.speech.Service",
    default_path = "/org/speech/Service"
)]
trait SpeechService {
    fn speak(&self, text: &str) -> zbus::Result<()>;
    fn speak_voice(&self, text: &str, voice: &str) -> zbus::Result<()>;
    fn ping(&self) -> zbus::Result<String>;
}

pub struct SpeechdSynthesizer {
    proxy: SpeechServiceProxy<'static>,
    voices: Vec<VoiceInfo>,
    in_flight: Mutex<Vec<(u64, JoinHandle<()>)>>,
}

impl std::fmt::Debug for SpeechdSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechdSynthesizer")
            .field("voices", &self.voices)
            .finish()
    }
}

impl SpeechdSynthesizer {
    pub async fn connect(voices: Vec<VoiceInfo>) -> Result<Self> {
        let connection = Connection::session().await?;
        let proxy = SpeechServiceProxy::new(&connection).await?;

        match proxy.ping().await {
            Ok(response) => {
                info!("🔊 Connected to speechd-ng: {}", response);
            }
            Err(e) => {
                warn!("⚠️ speechd-ng not responding: {}", e);
                return Err(anyhow::anyhow!("speechd-ng not responding: {}", e));
            }
        }
        if voices.is_empty() {
            info!("No speechd-ng voices configured, using the service default");
        }

        Ok(Self {
            proxy,
            voices,
            in_flight: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SynthesisPlatform for SpeechdSynthesizer {
    async fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.clone()
    }

    fn submit(&self, utterance: Utterance, events: mpsc::UnboundedSender<SynthesisEvent>) {
        // speechd-ng applies its own rate/pitch/volume settings
        debug!("speechd-ng ignores delivery {:?}", utterance.delivery);

        let id = utterance.id;
        let proxy = self.proxy.clone();
        let handle = tokio::spawn(async move {
            let result = match &utterance.voice {
                Some(voice) => proxy.speak_voice(&utterance.text, &voice.name).await,
                None => proxy.speak(&utterance.text).await,
            };
            let event = match result {
                Ok(()) => SynthesisEvent::End,
                Err(e) => SynthesisEvent::Error(e.to_string()),
            };
            let _ = events.send(event);
        });

        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.retain(|(_, h)| !h.is_finished());
        in_flight.push((id, handle));
    }

    fn withdraw(&self, id: u64) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.retain(|(utterance, handle)| {
            if *utterance == id {
                handle.abort();
                return false;
            }
            true
        });
    }

    fn cancel(&self) {
        // The service has no stop call; abandon the outstanding requests
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        for (_, handle) in in_flight.drain(..) {
            handle.abort();
        }
    }

    fn name(&self) -> &str {
        "speechd_ng"
    }
}
