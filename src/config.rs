use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::language::Language;
use crate::voices::VoiceInfo;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Meta
    pub language: Language,
    pub log_level: String,

    // Storage & Sync
    pub store_path: String,
    pub sync_endpoint: Option<String>,
    pub sync_timeout_secs: u64,
    pub legacy_pending_prefix: String,

    // Speech output
    pub tts_engine: String,
    pub espeak_binary: String,
    /// Voices installed in speechd-ng; the service cannot enumerate them
    pub speechd_voices: Vec<VoiceInfo>,
    pub speech_rate: f32,
    pub speech_pitch: f32,
    pub speech_volume: f32,

    // Speech input
    pub asr_engine: String,
    pub wyoming_host: String,
    pub wyoming_port: u16,
    pub audio_input: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: Language::En,
            log_level: "INFO".to_string(),
            store_path: dirs::data_dir()
                .unwrap_or_default()
                .join("agrivoice/offline.db")
                .to_string_lossy()
                .to_string(),
            sync_endpoint: None,
            sync_timeout_secs: 10,
            legacy_pending_prefix: "pending_".to_string(),
            tts_engine: "espeak".to_string(),
            espeak_binary: "espeak-ng".to_string(),
            speechd_voices: Vec::new(),
            speech_rate: 0.9,
            speech_pitch: 1.0,
            speech_volume: 1.0,
            asr_engine: "wyoming".to_string(),
            wyoming_host: "localhost".to_string(),
            wyoming_port: 10300,
            audio_input: dirs::data_dir()
                .unwrap_or_default()
                .join("agrivoice/capture.raw")
                .to_string_lossy()
                .to_string(),
        }
    }
}

impl Config {
    /// Load config from file, or fall back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                // Graceful degradation: log warning and use defaults
                tracing::warn!("⚠️ Config file corrupted or invalid, using defaults: {}", e);
                let backup_path = path.with_extension("json.corrupt");
                let _ = std::fs::rename(path, &backup_path);
                Ok(Self::default())
            }
        }
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agrivoice")
        .join("config.json")
}
