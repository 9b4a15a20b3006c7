//! Wyoming Protocol Client
//!
//! Implements the Wyoming protocol for external ASR services.
//! Wyoming is a simple protocol where events are JSON lines over TCP.
//!
//! Reference: https://github.com/rhasspy/wyoming

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::source::{calculate_energy, AudioSource, CHANNELS, SAMPLE_RATE, SAMPLE_WIDTH};
use super::{RecognitionEvent, RecognitionPlatform, RecognizerSettings};

/// Below this RMS energy the capture is treated as silence
const SILENCE_ENERGY: f32 = 30.0;

/// Outgoing Wyoming events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
enum ClientEvent {
    #[serde(rename = "describe")]
    Describe,

    #[serde(rename = "transcribe")]
    Transcribe { language: String },

    #[serde(rename = "audio-start")]
    AudioStart { rate: u32, width: u8, channels: u8 },

    #[serde(rename = "audio-chunk")]
    AudioChunk {
        rate: u32,
        width: u8,
        channels: u8,
        audio: String,
        timestamp: u64,
    },

    #[serde(rename = "audio-stop")]
    AudioStop,
}

/// Info response data
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InfoData {
    #[serde(default)]
    pub asr: Vec<AsrInfo>,
}

/// ASR service info
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrInfo {
    pub name: String,
    #[serde(default)]
    pub languages: Vec<String>,
}

impl InfoData {
    pub fn languages(&self) -> Vec<String> {
        self.asr.iter().flat_map(|a| a.languages.clone()).collect()
    }
}

/// Wyoming wants a bare language code (`en`), not a full locale (`en-US`)
fn wyoming_language(locale: &str) -> String {
    locale
        .split(['-', '_'])
        .next()
        .unwrap_or(locale)
        .to_ascii_lowercase()
}

async fn send_event(writer: &mut OwnedWriteHalf, event: &ClientEvent) -> Result<()> {
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    Ok(())
}

/// Wyoming client for ASR services
#[derive(Debug, Clone)]
pub struct WyomingClient {
    host: String,
    port: u16,
}

impl WyomingClient {
    /// Create a new Wyoming client
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }

    /// Check if the server is available
    pub async fn health_check(&self) -> bool {
        match TcpStream::connect((&*self.host, self.port)).await {
            Ok(_) => {
                debug!("Wyoming server available at {}:{}", self.host, self.port);
                true
            }
            Err(e) => {
                warn!("Wyoming server not available: {}", e);
                false
            }
        }
    }

    /// Ask the server what it supports
    pub async fn describe(&self) -> Result<InfoData> {
        let stream = TcpStream::connect((&*self.host, self.port))
            .await
            .context("Failed to connect to Wyoming server")?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        send_event(&mut writer, &ClientEvent::Describe).await?;
        writer.flush().await?;

        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Err(anyhow::anyhow!("Wyoming server closed before info"));
            }
            let event: serde_json::Value = match serde_json::from_str(&line) {
                Ok(event) => event,
                Err(_) => continue,
            };
            if event.get("type").and_then(|t| t.as_str()) == Some("info") {
                let data = event.get("data").cloned().unwrap_or_default();
                return Ok(serde_json::from_value(data).unwrap_or_default());
            }
        }
    }

    /// Stream one utterance to the server and return its transcript
    pub async fn transcribe(
        &self,
        mut audio: BoxStream<'static, Result<Vec<u8>>>,
        language: &str,
    ) -> Result<String> {
        let stream = TcpStream::connect((&*self.host, self.port))
            .await
            .context("Failed to connect to Wyoming server")?;

        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        send_event(
            &mut writer,
            &ClientEvent::Transcribe {
                language: wyoming_language(language),
            },
        )
        .await?;
        send_event(
            &mut writer,
            &ClientEvent::AudioStart {
                rate: SAMPLE_RATE,
                width: SAMPLE_WIDTH,
                channels: CHANNELS,
            },
        )
        .await?;

        let mut sent = 0usize;
        while let Some(chunk) = audio.next().await {
            let chunk = chunk?;
            sent += chunk.len();
            send_event(
                &mut writer,
                &ClientEvent::AudioChunk {
                    rate: SAMPLE_RATE,
                    width: SAMPLE_WIDTH,
                    channels: CHANNELS,
                    audio: STANDARD.encode(&chunk),
                    timestamp: 0,
                },
            )
            .await?;
        }

        send_event(&mut writer, &ClientEvent::AudioStop).await?;
        writer.flush().await?;
        debug!("Sent audio ({} bytes), waiting for transcript...", sent);

        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Err(anyhow::anyhow!("Wyoming server closed without a transcript"));
            }

            if let Ok(event) = serde_json::from_str::<serde_json::Value>(&line) {
                if event.get("type").and_then(|t| t.as_str()) == Some("transcript") {
                    let text = event
                        .get("data")
                        .and_then(|d| d.get("text"))
                        .and_then(|t| t.as_str())
                        .unwrap_or_default()
                        .trim()
                        .to_string();
                    info!("📝 Wyoming transcript: '{}'", text);
                    return Ok(text);
                }
            }
        }
    }
}

/// Recognition platform backed by a Wyoming server
#[derive(Debug)]
pub struct WyomingRecognizer {
    client: WyomingClient,
    source: Arc<dyn AudioSource>,
    session: Mutex<Option<JoinHandle<()>>>,
}

impl WyomingRecognizer {
    pub fn new(client: WyomingClient, source: Arc<dyn AudioSource>) -> Self {
        Self {
            client,
            source,
            session: Mutex::new(None),
        }
    }
}

impl RecognitionPlatform for WyomingRecognizer {
    fn start(
        &self,
        settings: RecognizerSettings,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> Result<()> {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        if session.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(anyhow::anyhow!("Wyoming session already running"));
        }

        let client = self.client.clone();
        let source = Arc::clone(&self.source);
        *session = Some(tokio::spawn(async move {
            // Buffer the capture so silence can be rejected before the round trip
            let chunks: Vec<Result<Vec<u8>>> = source.capture().collect().await;
            let mut audio = Vec::new();
            for chunk in chunks {
                match chunk {
                    Ok(chunk) => audio.extend_from_slice(&chunk),
                    Err(e) => {
                        let _ = events.send(RecognitionEvent::Error(e.to_string()));
                        return;
                    }
                }
            }

            if calculate_energy(&audio) < SILENCE_ENERGY {
                debug!("Capture is silent, skipping transcription");
                let _ = events.send(RecognitionEvent::End);
                return;
            }

            let audio = futures::stream::iter(vec![Ok(audio)]).boxed();
            match client.transcribe(audio, &settings.locale).await {
                Ok(text) if !text.is_empty() => {
                    let _ = events.send(RecognitionEvent::Result {
                        transcript: text,
                        is_final: true,
                    });
                }
                Ok(_) => {
                    let _ = events.send(RecognitionEvent::End);
                }
                Err(e) => {
                    let _ = events.send(RecognitionEvent::Error(e.to_string()));
                }
            }
        }));
        Ok(())
    }

    fn stop(&self) {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = session.take() {
            handle.abort();
        }
    }

    fn name(&self) -> &str {
        "wyoming"
    }
}
