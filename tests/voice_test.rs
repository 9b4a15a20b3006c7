use agrivoice::asr::{RecognitionEvent, VoiceInput};
use agrivoice::tts::{SpeechDelivery, SynthesisEvent, VoiceOutput};
use agrivoice::voices::VoiceInfo;
use agrivoice::{AgriError, Capability, Language, VoiceServices};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_test::{assert_pending, assert_ready, assert_ready_ok};

mod common;
use common::eventually;
use common::mock_asr::MockRecognizer;
use common::mock_tts::MockSynthesizer;

fn indian_voices() -> Vec<VoiceInfo> {
    vec![
        VoiceInfo::new("Samantha", "en-US"),
        VoiceInfo::new("Lekha", "hi-IN"),
        VoiceInfo::new("Vani", "ta-IN"),
    ]
}

#[tokio::test]
async fn test_speak_resolves_after_end_of_utterance() {
    let synth = Arc::new(MockSynthesizer::with_voices(indian_voices()));
    let output = VoiceOutput::new(Some(synth.clone()), SpeechDelivery::default()).await;

    let mut speaking = tokio_test::task::spawn(output.speak("test", Language::En));
    assert_pending!(speaking.poll());
    assert_eq!(synth.submitted_texts(), vec!["test"]);

    synth.finish();
    assert_ready_ok!(speaking.poll());
}

#[tokio::test]
async fn test_speak_rejects_on_synthesis_error() {
    let synth = Arc::new(MockSynthesizer::with_voices(indian_voices()));
    let output = VoiceOutput::new(Some(synth.clone()), SpeechDelivery::default()).await;

    let mut speaking = tokio_test::task::spawn(output.speak("test", Language::En));
    assert_pending!(speaking.poll());
    synth.fail("audio device busy");

    let result = assert_ready!(speaking.poll());
    match result {
        Err(AgriError::Synthesis(msg)) => assert_eq!(msg, "audio device busy"),
        other => panic!("expected synthesis error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_speak_resolves_exactly_once() {
    let synth = Arc::new(MockSynthesizer::with_voices(indian_voices()));
    let output = VoiceOutput::new(Some(synth.clone()), SpeechDelivery::default()).await;

    let mut speaking = tokio_test::task::spawn(output.speak("test", Language::En));
    assert_pending!(speaking.poll());
    synth.report(&[
        SynthesisEvent::End,
        SynthesisEvent::Error("late error".to_string()),
    ]);
    assert_ready_ok!(speaking.poll());
}

#[tokio::test]
async fn test_speak_uses_preferred_voice_and_fixed_delivery() {
    let synth = Arc::new(MockSynthesizer::with_voices(indian_voices()));
    let output = VoiceOutput::new(Some(synth.clone()), SpeechDelivery::default()).await;

    let mut speaking = tokio_test::task::spawn(output.speak("vanakkam", Language::Ta));
    assert_pending!(speaking.poll());
    synth.finish();
    assert_ready_ok!(speaking.poll());

    let submitted = synth.submitted.lock().unwrap().clone();
    assert_eq!(submitted[0].voice, Some(VoiceInfo::new("Vani", "ta-IN")));
    assert_eq!(submitted[0].delivery.rate, 0.9);
    assert_eq!(submitted[0].delivery.pitch, 1.0);
    assert_eq!(submitted[0].delivery.volume, 1.0);
}

#[tokio::test]
async fn test_marathi_without_voice_falls_back() {
    let synth = Arc::new(MockSynthesizer::with_voices(indian_voices()));
    let output = VoiceOutput::new(Some(synth.clone()), SpeechDelivery::default()).await;

    let mut speaking = tokio_test::task::spawn(output.speak("namaskar", Language::Mr));
    assert_pending!(speaking.poll());
    synth.finish();
    assert_ready_ok!(speaking.poll());

    assert!(synth.last_voice().is_some());
}

#[tokio::test]
async fn test_voices_loaded_after_change_notification() {
    let synth = Arc::new(MockSynthesizer::default());
    let output = VoiceOutput::new(Some(synth.clone()), SpeechDelivery::default()).await;
    let resolver = output.resolver().unwrap().clone();
    assert!(resolver.resolve(Language::Hi).is_none());

    synth.load_voices(indian_voices());
    eventually(|| {
        let resolver = resolver.clone();
        async move { !resolver.voices().is_empty() }
    })
    .await;

    assert_eq!(
        resolver.resolve(Language::Hi),
        Some(VoiceInfo::new("Lekha", "hi-IN"))
    );
}

#[tokio::test]
async fn test_stop_cancels_outstanding_speech() {
    let synth = Arc::new(MockSynthesizer::with_voices(indian_voices()));
    let output = VoiceOutput::new(Some(synth.clone()), SpeechDelivery::default()).await;

    let mut first = tokio_test::task::spawn(output.speak("one", Language::En));
    let mut second = tokio_test::task::spawn(output.speak("two", Language::En));
    assert_pending!(first.poll());
    assert_pending!(second.poll());

    output.stop();
    assert!(matches!(assert_ready!(first.poll()), Err(AgriError::Cancelled)));
    assert!(matches!(assert_ready!(second.poll()), Err(AgriError::Cancelled)));
    assert_eq!(synth.cancels.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dropped_speak_withdraws_utterance() {
    let synth = Arc::new(MockSynthesizer::with_voices(indian_voices()));
    let output = VoiceOutput::new(Some(synth.clone()), SpeechDelivery::default()).await;

    let result = tokio::time::timeout(
        std::time::Duration::from_millis(20),
        output.speak("abandoned", Language::Hi),
    )
    .await;
    assert!(result.is_err());

    let abandoned = synth.submitted.lock().unwrap()[0].id;
    assert_eq!(*synth.withdrawn.lock().unwrap(), vec![abandoned]);
    assert_eq!(synth.cancels.load(Ordering::SeqCst), 0);

    // Later speech is unaffected
    let mut next = tokio_test::task::spawn(output.speak("next", Language::Hi));
    assert_pending!(next.poll());
    synth.finish();
    assert_ready_ok!(next.poll());
    assert_eq!(synth.withdrawn.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unsupported_synthesis_rejects_immediately() {
    let voice = VoiceServices::new(None, None, SpeechDelivery::default()).await;
    assert!(!voice.is_supported());
    assert!(!voice.capabilities().synthesis);

    let err = voice.speak("test", Language::En).await.unwrap_err();
    assert!(matches!(
        err,
        AgriError::UnsupportedCapability(Capability::Synthesis)
    ));
    let err = voice.listen(Language::En).await.unwrap_err();
    assert!(matches!(
        err,
        AgriError::UnsupportedCapability(Capability::Recognition)
    ));
}

#[tokio::test]
async fn test_listen_returns_single_final_transcript() {
    let recognizer = Arc::new(MockRecognizer::with_phrase("how much water for wheat"));
    let input = VoiceInput::new(Some(recognizer.clone()));

    let transcript = input.listen(Language::En).await.unwrap();
    assert_eq!(transcript, "how much water for wheat");

    let session = recognizer.last_session().unwrap();
    assert_eq!(session.locale, "en-US");
    assert!(!session.continuous);
    assert!(!session.interim_results);
    assert!(!input.is_listening());
}

#[tokio::test]
async fn test_listen_ignores_interim_results() {
    let recognizer = Arc::new(MockRecognizer::new(vec![
        RecognitionEvent::Result {
            transcript: "mandi".to_string(),
            is_final: false,
        },
        RecognitionEvent::Result {
            transcript: "mandi bhav".to_string(),
            is_final: true,
        },
        RecognitionEvent::Result {
            transcript: "ignored".to_string(),
            is_final: true,
        },
    ]));
    let input = VoiceInput::new(Some(recognizer.clone()));

    assert_eq!(input.listen(Language::Hi).await.unwrap(), "mandi bhav");
    assert_eq!(recognizer.last_session().unwrap().locale, "hi-IN");
}

#[tokio::test]
async fn test_listen_surfaces_recognizer_fault() {
    let recognizer = Arc::new(MockRecognizer::new(vec![RecognitionEvent::Error(
        "not-allowed".to_string(),
    )]));
    let input = VoiceInput::new(Some(recognizer));

    match input.listen(Language::Ta).await {
        Err(AgriError::Recognition(msg)) => assert_eq!(msg, "not-allowed"),
        other => panic!("expected recognition error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_listen_without_speech_is_an_error() {
    let recognizer = Arc::new(MockRecognizer::new(vec![RecognitionEvent::End]));
    let input = VoiceInput::new(Some(recognizer));

    assert!(matches!(
        input.listen(Language::Mr).await,
        Err(AgriError::Recognition(_))
    ));
}

#[tokio::test]
async fn test_concurrent_listen_is_rejected_and_stop_cancels() {
    let recognizer = Arc::new(MockRecognizer::silent());
    let input = VoiceInput::new(Some(recognizer.clone()));

    let mut first = tokio_test::task::spawn(input.listen(Language::En));
    assert_pending!(first.poll());
    assert!(input.is_listening());

    let err = input.listen(Language::En).await.unwrap_err();
    assert!(matches!(err, AgriError::Busy(Capability::Recognition)));

    input.stop();
    assert!(matches!(assert_ready!(first.poll()), Err(AgriError::Cancelled)));
    assert!(!input.is_listening());
    assert_eq!(recognizer.sessions.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_dropped_listen_stops_recognizer() {
    let recognizer = Arc::new(MockRecognizer::silent());
    let input = VoiceInput::new(Some(recognizer.clone()));

    let result = tokio::time::timeout(
        std::time::Duration::from_millis(20),
        input.listen(Language::En),
    )
    .await;
    assert!(result.is_err());
    assert_eq!(recognizer.stops.load(Ordering::SeqCst), 1);
    assert!(!input.is_listening());

    // A fresh session can start once the abandoned one is gone
    let mut again = tokio_test::task::spawn(input.listen(Language::En));
    assert_pending!(again.poll());
}

#[tokio::test]
async fn test_services_stop_cancels_both_engines() {
    let synth = Arc::new(MockSynthesizer::with_voices(indian_voices()));
    let recognizer = Arc::new(MockRecognizer::silent());
    let voice = VoiceServices::new(
        Some(synth.clone()),
        Some(recognizer.clone()),
        SpeechDelivery::default(),
    )
    .await;
    assert!(voice.is_supported());

    let mut speaking = tokio_test::task::spawn(voice.speak("prompt", Language::Hi));
    let mut listening = tokio_test::task::spawn(voice.listen(Language::Hi));
    assert_pending!(speaking.poll());
    assert_pending!(listening.poll());

    voice.stop();
    assert!(matches!(assert_ready!(speaking.poll()), Err(AgriError::Cancelled)));
    assert!(matches!(assert_ready!(listening.poll()), Err(AgriError::Cancelled)));
}
