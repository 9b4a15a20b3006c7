//! Voice services
//!
//! Negotiates platform capabilities once and hands out the two engines.
//! UI collaborators check [`Capabilities`] to decide whether to offer voice
//! prompts or fall back to text input.

use std::sync::Arc;
use tracing::info;

use crate::asr::{self, RecognitionPlatform, VoiceInput};
use crate::config::Config;
use crate::error::AgriResult;
use crate::language::Language;
use crate::tts::{self, SpeechDelivery, SynthesisPlatform, VoiceOutput};

/// What the platform can do, decided at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub synthesis: bool,
    pub recognition: bool,
}

#[derive(Debug)]
pub struct VoiceServices {
    output: VoiceOutput,
    input: VoiceInput,
    capabilities: Capabilities,
}

impl VoiceServices {
    pub async fn new(
        synthesis: Option<Arc<dyn SynthesisPlatform>>,
        recognition: Option<Arc<dyn RecognitionPlatform>>,
        delivery: SpeechDelivery,
    ) -> Self {
        let capabilities = Capabilities {
            synthesis: synthesis.is_some(),
            recognition: recognition.is_some(),
        };
        info!(
            "🎙️ Voice capabilities: synthesis={} recognition={}",
            capabilities.synthesis, capabilities.recognition
        );

        Self {
            output: VoiceOutput::new(synthesis, delivery).await,
            input: VoiceInput::new(recognition),
            capabilities,
        }
    }

    /// Probe the platforms named in `config`
    pub async fn from_config(config: &Config) -> Self {
        let synthesis = tts::create_platform(config).await;
        let recognition = asr::create_platform(config).await;
        Self::new(synthesis, recognition, SpeechDelivery::from(config)).await
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Both speaking and listening are available
    pub fn is_supported(&self) -> bool {
        self.capabilities.synthesis && self.capabilities.recognition
    }

    pub fn output(&self) -> &VoiceOutput {
        &self.output
    }

    pub fn input(&self) -> &VoiceInput {
        &self.input
    }

    pub async fn speak(&self, text: &str, language: Language) -> AgriResult<()> {
        self.output.speak(text, language).await
    }

    pub async fn listen(&self, language: Language) -> AgriResult<String> {
        self.input.listen(language).await
    }

    /// Cancel whatever is speaking or listening
    pub fn stop(&self) {
        self.output.stop();
        self.input.stop();
    }
}
