//! AgriVoice Library
//!
//! Offline-first storage with a pending-write sync queue, and a multilingual
//! voice layer over platform speech synthesis and recognition.

pub mod asr;
pub mod config;
pub mod error;
pub mod language;
pub mod store;
pub mod sync;
pub mod tts;
pub mod voice;
pub mod voices;

pub use error::{AgriError, AgriResult, Capability};
pub use language::Language;
pub use store::OfflineStore;
pub use sync::{Connectivity, ConnectivityMonitor, SyncCoordinator};
pub use voice::{Capabilities, VoiceServices};
