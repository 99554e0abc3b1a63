//! Named test inputs: audio, text and JSON examples.
//!
//! Lookup order for a name:
//! 1. fixtures installed with [`FixtureProvider::register`]
//! 2. the per-provider cache of previously read files
//! 3. `<dir>/<name>` on disk (read lazily, then cached)
//! 4. fallbacks installed with [`FixtureProvider::register_fallback`]
//!
//! Contents are immutable once loaded; repeated loads of a name are byte-identical.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use serde_json::Value;

use crate::error::HarnessError;

pub mod synth;

/// Canonical name of the speech sample used by transcription scenarios.
pub const AUDIO_WAV: &str = "audio.wav";
/// Canonical name of a payload that is not decodable audio.
pub const BAD_AUDIO: &str = "bad-audio.bin";
/// Canonical name of the text sample used by TTS and text-intelligence scenarios.
pub const SAMPLE_TEXT: &str = "sample-text.txt";

#[derive(Debug, Default)]
struct Store {
    registered: HashMap<String, Bytes>,
    cache: HashMap<String, Bytes>,
    fallbacks: HashMap<String, Bytes>,
}

/// Loads and caches fixtures. Clones share the same cache.
#[derive(Debug, Clone)]
pub struct FixtureProvider {
    dir: PathBuf,
    store: Arc<Mutex<Store>>,
}

impl FixtureProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), store: Arc::new(Mutex::new(Store::default())) }
    }

    /// Provider whose canonical fixtures fall back to synthetic content when absent on disk.
    pub fn with_synthetic_fallbacks(dir: impl Into<PathBuf>) -> Self {
        let provider = Self::new(dir);
        let tone = synth::sine_pcm16(440.0, 16_000, 16_000);
        provider.register_fallback(AUDIO_WAV, synth::wav_pcm16(&tone, 16_000, 1));
        provider.register_fallback(BAD_AUDIO, synth::noise_pcm16(0x5eed, 512));
        provider.register_fallback(
            SAMPLE_TEXT,
            Bytes::from_static(b"Hello! This is a short sample used to verify the text pipeline."),
        );
        provider
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Install an in-memory fixture. Takes precedence over disk.
    pub fn register(&self, name: impl Into<String>, content: impl Into<Bytes>) {
        self.store().registered.insert(name.into(), content.into());
    }

    /// Install content used only when `name` does not exist on disk.
    pub fn register_fallback(&self, name: impl Into<String>, content: impl Into<Bytes>) {
        self.store().fallbacks.insert(name.into(), content.into());
    }

    /// Raw bytes of a fixture.
    pub async fn load_binary(&self, name: &str) -> Result<Bytes, HarnessError> {
        {
            let store = self.store();
            if let Some(b) = store.registered.get(name).or_else(|| store.cache.get(name)) {
                return Ok(b.clone());
            }
        }

        let path = self.dir.join(name);
        match tokio::fs::read(&path).await {
            Ok(raw) => {
                let bytes = Bytes::from(raw);
                let mut store = self.store();
                // another task may have raced us; first write wins so content stays identical
                let entry = store.cache.entry(name.to_string()).or_insert(bytes);
                tracing::debug!(fixture = name, path = %path.display(), "fixture loaded");
                Ok(entry.clone())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self
                .store()
                .fallbacks
                .get(name)
                .cloned()
                .ok_or_else(|| HarnessError::FixtureNotFound {
                    name: name.to_string(),
                    path: path.display().to_string(),
                }),
            Err(e) => Err(parse_error(name, e)),
        }
    }

    /// Fixture decoded as UTF-8.
    pub async fn load_text(&self, name: &str) -> Result<String, HarnessError> {
        let raw = self.load_binary(name).await?;
        String::from_utf8(raw.to_vec()).map_err(|e| parse_error(name, e))
    }

    /// Fixture parsed as JSON.
    pub async fn load_json(&self, name: &str) -> Result<Value, HarnessError> {
        let raw = self.load_binary(name).await?;
        serde_json::from_slice(&raw).map_err(|e| parse_error(name, e))
    }
}

fn parse_error(name: &str, reason: impl std::fmt::Display) -> HarnessError {
    HarnessError::FixtureParse { name: name.to_string(), reason: reason.to_string() }
}
