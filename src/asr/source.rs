//! Audio sources feeding the recognizer
//!
//! Audio is raw PCM: 16 kHz, 16-bit little-endian, mono.

use anyhow::{Context, Result};
use futures::stream::{self, BoxStream, StreamExt};
use std::path::PathBuf;

pub const SAMPLE_RATE: u32 = 16000;
pub const SAMPLE_WIDTH: u8 = 2;
pub const CHANNELS: u8 = 1;

const CHUNK_BYTES: usize = 2048;

/// Trait for capture devices
pub trait AudioSource: Send + Sync + std::fmt::Debug {
    /// Stream the audio of one utterance as PCM chunks
    fn capture(&self) -> BoxStream<'static, Result<Vec<u8>>>;
}

/// Reads one utterance from a raw PCM file, e.g. written by `arecord -f S16_LE -r 16000`
#[derive(Debug, Clone)]
pub struct PcmFileSource {
    path: PathBuf,
}

impl PcmFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AudioSource for PcmFileSource {
    fn capture(&self) -> BoxStream<'static, Result<Vec<u8>>> {
        let path = self.path.clone();
        stream::once(async move {
            tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read audio from {}", path.display()))
        })
        .flat_map(|read| match read {
            Ok(bytes) => {
                let chunks: Vec<Result<Vec<u8>>> =
                    bytes.chunks(CHUNK_BYTES).map(|c| Ok(c.to_vec())).collect();
                stream::iter(chunks)
            }
            Err(e) => stream::iter(vec![Err(e)]),
        })
        .boxed()
    }
}

/// Calculate audio energy of little-endian 16-bit samples
pub fn calculate_energy(pcm: &[u8]) -> f32 {
    let samples: Vec<i16> = pcm
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();
    if samples.is_empty() {
        return 0.0;
    }

    let sum: i64 = samples.iter().map(|&s| (s as i64).pow(2)).sum();
    (sum as f32 / samples.len() as f32).sqrt()
}
