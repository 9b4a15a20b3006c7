//! Mock Recognition Platform for Testing
//!
//! Replays a scripted list of events when a session starts. An empty script
//! leaves the session open until the test stops it.

use agrivoice::asr::{RecognitionEvent, RecognitionPlatform, RecognizerSettings};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

#[derive(Debug, Default)]
pub struct MockRecognizer {
    script: Vec<RecognitionEvent>,
    /// Settings of every session started
    pub sessions: Mutex<Vec<RecognizerSettings>>,
    open: Mutex<Option<mpsc::UnboundedSender<RecognitionEvent>>>,
    pub stops: AtomicUsize,
}

impl MockRecognizer {
    pub fn new(script: Vec<RecognitionEvent>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Recognizer that hears a single phrase
    pub fn with_phrase(text: &str) -> Self {
        Self::new(vec![
            RecognitionEvent::Result {
                transcript: text.to_string(),
                is_final: true,
            },
            RecognitionEvent::End,
        ])
    }

    /// Recognizer that never reports anything on its own
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn last_session(&self) -> Option<RecognizerSettings> {
        self.sessions.lock().unwrap().last().cloned()
    }
}

impl RecognitionPlatform for MockRecognizer {
    fn start(
        &self,
        settings: RecognizerSettings,
        events: mpsc::UnboundedSender<RecognitionEvent>,
    ) -> anyhow::Result<()> {
        self.sessions.lock().unwrap().push(settings);
        for event in &self.script {
            let _ = events.send(event.clone());
        }
        if self.script.is_empty() {
            *self.open.lock().unwrap() = Some(events);
        }
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.open.lock().unwrap().take();
    }

    fn name(&self) -> &str {
        "mock"
    }
}
