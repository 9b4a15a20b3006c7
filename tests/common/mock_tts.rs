//! Mock Synthesis Platform for Testing
//!
//! Records submitted utterances and lets the test decide when and how each
//! one finishes.

use agrivoice::tts::{SynthesisEvent, SynthesisPlatform, Utterance};
use agrivoice::voices::VoiceInfo;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Default)]
pub struct MockSynthesizer {
    voices: Mutex<Vec<VoiceInfo>>,
    voices_changed: Mutex<Option<oneshot::Sender<()>>>,
    /// Every utterance handed to the platform
    pub submitted: Mutex<Vec<Utterance>>,
    outstanding: Mutex<Vec<(u64, mpsc::UnboundedSender<SynthesisEvent>)>>,
    /// Ids of utterances withdrawn by an abandoned `speak`
    pub withdrawn: Mutex<Vec<u64>>,
    pub cancels: AtomicUsize,
}

impl MockSynthesizer {
    pub fn with_voices(voices: Vec<VoiceInfo>) -> Self {
        Self {
            voices: Mutex::new(voices),
            ..Self::default()
        }
    }

    /// Install voices and fire the voices-changed notification
    pub fn load_voices(&self, voices: Vec<VoiceInfo>) {
        *self.voices.lock().unwrap() = voices;
        if let Some(tx) = self.voices_changed.lock().unwrap().take() {
            let _ = tx.send(());
        }
    }

    pub fn submitted_texts(&self) -> Vec<String> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.text.clone())
            .collect()
    }

    pub fn last_voice(&self) -> Option<VoiceInfo> {
        self.submitted.lock().unwrap().last()?.voice.clone()
    }

    /// Report events for the oldest outstanding utterance, then forget it
    pub fn report(&self, events: &[SynthesisEvent]) {
        let mut outstanding = self.outstanding.lock().unwrap();
        if outstanding.is_empty() {
            return;
        }
        let (_, tx) = outstanding.remove(0);
        for event in events {
            let _ = tx.send(event.clone());
        }
    }

    pub fn finish(&self) {
        self.report(&[SynthesisEvent::End]);
    }

    pub fn fail(&self, msg: &str) {
        self.report(&[SynthesisEvent::Error(msg.to_string())]);
    }
}

#[async_trait]
impl SynthesisPlatform for MockSynthesizer {
    async fn voices(&self) -> Vec<VoiceInfo> {
        self.voices.lock().unwrap().clone()
    }

    fn voices_changed(&self) -> Option<oneshot::Receiver<()>> {
        let (tx, rx) = oneshot::channel();
        *self.voices_changed.lock().unwrap() = Some(tx);
        Some(rx)
    }

    fn submit(&self, utterance: Utterance, events: mpsc::UnboundedSender<SynthesisEvent>) {
        let id = utterance.id;
        self.submitted.lock().unwrap().push(utterance);
        self.outstanding.lock().unwrap().push((id, events));
    }

    fn withdraw(&self, id: u64) {
        self.withdrawn.lock().unwrap().push(id);
        self.outstanding.lock().unwrap().retain(|(outstanding, _)| *outstanding != id);
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.outstanding.lock().unwrap().clear();
    }

    fn name(&self) -> &str {
        "mock"
    }
}
