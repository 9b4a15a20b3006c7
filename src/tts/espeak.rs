//! espeak-ng backend calling a local binary
//!
//! Utterances run one at a time through a worker task, mirroring the single
//! system-wide synthesis queue. `cancel` kills the running process and drops
//! everything queued behind it; `withdraw` does the same for one utterance.

use super::{SpeechDelivery, SynthesisEvent, SynthesisPlatform, Utterance};
use crate::voices::VoiceInfo;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

const DEFAULT_WORDS_PER_MINUTE: f32 = 175.0;
const DEFAULT_PITCH: f32 = 50.0;
const DEFAULT_AMPLITUDE: f32 = 100.0;

struct QueuedUtterance {
    utterance: Utterance,
    events: mpsc::UnboundedSender<SynthesisEvent>,
    generation: u64,
    withdrawn: oneshot::Receiver<()>,
}

/// Withdraw triggers of utterances not yet finished, by utterance id
type WithdrawMap = Arc<Mutex<HashMap<u64, oneshot::Sender<()>>>>;

pub struct EspeakSynthesizer {
    binary: String,
    queue: mpsc::UnboundedSender<QueuedUtterance>,
    cancel: watch::Sender<u64>,
    withdraw: WithdrawMap,
}

impl std::fmt::Debug for EspeakSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EspeakSynthesizer")
            .field("binary", &self.binary)
            .finish()
    }
}

impl EspeakSynthesizer {
    /// Check that the binary runs, then start the playback worker
    pub async fn probe(binary: &str) -> Result<Self> {
        let output = Command::new(binary)
            .arg("--version")
            .output()
            .await
            .with_context(|| format!("Failed to run {}", binary))?;
        if !output.status.success() {
            return Err(anyhow::anyhow!("{} --version failed with {}", binary, output.status));
        }
        info!(
            "🔊 Found {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(Self::new(binary))
    }

    pub fn new(binary: &str) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let (cancel, cancel_rx) = watch::channel(0);
        let withdraw = WithdrawMap::default();
        tokio::spawn(run_queue(
            binary.to_string(),
            rx,
            cancel_rx,
            Arc::clone(&withdraw),
        ));
        Self {
            binary: binary.to_string(),
            queue,
            cancel,
            withdraw,
        }
    }
}

async fn run_queue(
    binary: String,
    mut queue: mpsc::UnboundedReceiver<QueuedUtterance>,
    mut cancel: watch::Receiver<u64>,
    withdraw: WithdrawMap,
) {
    while let Some(mut item) = queue.recv().await {
        play(&binary, &mut item, &mut cancel).await;
        withdraw
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&item.utterance.id);
    }
}

async fn play(binary: &str, item: &mut QueuedUtterance, cancel: &mut watch::Receiver<u64>) {
    if item.generation != *cancel.borrow_and_update() {
        debug!("Dropping utterance queued before cancel");
        return;
    }
    if !matches!(item.withdrawn.try_recv(), Err(oneshot::error::TryRecvError::Empty)) {
        debug!("Dropping withdrawn utterance {}", item.utterance.id);
        return;
    }

    let mut child = match Command::new(binary)
        .args(espeak_args(&item.utterance))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            error!("❌ Failed to spawn {}: {}", binary, e);
            let _ = item
                .events
                .send(SynthesisEvent::Error(format!("Failed to spawn {}: {}", binary, e)));
            return;
        }
    };

    tokio::select! {
        status = child.wait() => {
            let event = match status {
                Ok(status) if status.success() => SynthesisEvent::End,
                Ok(status) => SynthesisEvent::Error(format!("espeak exited with {}", status)),
                Err(e) => SynthesisEvent::Error(e.to_string()),
            };
            let _ = item.events.send(event);
        }
        _ = cancel.changed() => {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop espeak: {}", e);
            }
        }
        _ = &mut item.withdrawn => {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop espeak: {}", e);
            }
        }
    }
}

/// Map normalized delivery parameters onto espeak's native scales
fn espeak_args(utterance: &Utterance) -> Vec<String> {
    let SpeechDelivery {
        rate,
        pitch,
        volume,
    } = utterance.delivery;

    let mut args = Vec::new();
    if let Some(voice) = &utterance.voice {
        args.push("-v".to_string());
        args.push(voice.name.clone());
    }
    args.push("-s".to_string());
    args.push(((DEFAULT_WORDS_PER_MINUTE * rate).round() as u32).to_string());
    args.push("-p".to_string());
    args.push(((DEFAULT_PITCH * pitch).round().clamp(0.0, 99.0) as u32).to_string());
    args.push("-a".to_string());
    args.push(((DEFAULT_AMPLITUDE * volume).round().clamp(0.0, 200.0) as u32).to_string());
    args.push("--".to_string());
    args.push(utterance.text.clone());
    args
}

/// Parse `espeak-ng --voices` output.
///
/// Columns: `Pty Language Age/Gender VoiceName File Other-Languages`.
fn parse_voices(listing: &str) -> Vec<VoiceInfo> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let _priority = cols.next()?;
            let language = cols.next()?;
            Some(VoiceInfo::new(language, language))
        })
        .collect()
}

#[async_trait]
impl SynthesisPlatform for EspeakSynthesizer {
    async fn voices(&self) -> Vec<VoiceInfo> {
        match Command::new(&self.binary).arg("--voices").output().await {
            Ok(output) if output.status.success() => {
                parse_voices(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                warn!("⚠️ {} --voices failed with {}", self.binary, output.status);
                Vec::new()
            }
            Err(e) => {
                warn!("⚠️ Could not list espeak voices: {}", e);
                Vec::new()
            }
        }
    }

    fn submit(&self, utterance: Utterance, events: mpsc::UnboundedSender<SynthesisEvent>) {
        let (trigger, withdrawn) = oneshot::channel();
        self.withdraw
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(utterance.id, trigger);
        let item = QueuedUtterance {
            utterance,
            events,
            generation: *self.cancel.borrow(),
            withdrawn,
        };
        if let Err(mpsc::error::SendError(item)) = self.queue.send(item) {
            let _ = item
                .events
                .send(SynthesisEvent::Error("espeak worker stopped".to_string()));
        }
    }

    fn withdraw(&self, id: u64) {
        let trigger = self
            .withdraw
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
        if let Some(trigger) = trigger {
            let _ = trigger.send(());
        }
    }

    fn cancel(&self) {
        self.cancel.send_modify(|generation| *generation += 1);
    }

    fn name(&self) -> &str {
        "espeak"
    }
}
