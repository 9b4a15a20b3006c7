//! Language-Voice Resolver
//!
//! Picks a concrete platform voice for a [`Language`]. The voice inventory is
//! cached and shared by every speech request; if the platform has not loaded
//! its voices yet, the resolver refreshes once when the platform signals that
//! the list changed, without blocking callers in the meantime.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::language::{locale_matches, Language};
use crate::tts::SynthesisPlatform;

/// A platform voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    /// Identifier the platform accepts when selecting the voice
    pub name: String,
    /// Locale identifier such as `en-US` or `hi`
    pub locale: String,
}

impl VoiceInfo {
    pub fn new(name: &str, locale: &str) -> Self {
        Self {
            name: name.to_string(),
            locale: locale.to_string(),
        }
    }
}

/// Best voice for `language`: first preference match, else any voice
pub fn select_voice(voices: &[VoiceInfo], language: Language) -> Option<&VoiceInfo> {
    for preferred in language.voice_preferences() {
        if let Some(voice) = voices.iter().find(|v| locale_matches(&v.locale, preferred)) {
            return Some(voice);
        }
    }
    voices.first()
}

/// Cached voice inventory for one synthesis platform
#[derive(Debug, Clone)]
pub struct VoiceResolver {
    platform: Arc<dyn SynthesisPlatform>,
    voices: Arc<RwLock<Vec<VoiceInfo>>>,
}

impl VoiceResolver {
    /// Load the inventory, subscribing to voice-list changes when it is empty
    pub async fn new(platform: Arc<dyn SynthesisPlatform>) -> Self {
        let voices = platform.voices().await;
        let cache = Arc::new(RwLock::new(voices));
        let resolver = Self {
            platform,
            voices: cache,
        };

        if resolver.voices().is_empty() {
            resolver.watch_for_voices();
        } else {
            info!("🗣️ Loaded {} voices from {}", resolver.voices().len(), resolver.platform.name());
        }
        resolver
    }

    fn watch_for_voices(&self) {
        let Some(changed) = self.platform.voices_changed() else {
            warn!("⚠️ {} reported no voices", self.platform.name());
            return;
        };

        debug!("No voices yet, waiting for {} to load them", self.platform.name());
        let platform = Arc::clone(&self.platform);
        let cache = Arc::clone(&self.voices);
        tokio::spawn(async move {
            if changed.await.is_err() {
                return;
            }
            let voices = platform.voices().await;
            info!("🗣️ Voice list changed, {} voices available", voices.len());
            *cache.write().unwrap_or_else(|e| e.into_inner()) = voices;
        });
    }

    /// Re-read the inventory from the platform
    pub async fn refresh(&self) {
        let voices = self.platform.voices().await;
        *self.voices.write().unwrap_or_else(|e| e.into_inner()) = voices;
    }

    pub fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// `None` only when the platform has no voices at all
    pub fn resolve(&self, language: Language) -> Option<VoiceInfo> {
        let voices = self.voices.read().unwrap_or_else(|e| e.into_inner());
        let voice = select_voice(&voices, language).cloned();
        debug!("Resolved voice for {}: {:?}", language, voice);
        voice
    }
}
