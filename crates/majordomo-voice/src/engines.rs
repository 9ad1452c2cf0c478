use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Result, VoiceError};

/// Speech-to-text engine contract. Concrete engines (whisper server, cloud
/// STT) live outside the kernel.
#[async_trait]
pub trait SttEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Transcribe a WAV payload into text.
    async fn transcribe(&self, wav: &[u8]) -> Result<String>;
}

/// Text-to-speech engine contract.
#[async_trait]
pub trait TtsEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Synthesize `text` into a WAV payload.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// Build engines from the config's `stt`/`tts` values. An `http(s)://` value
/// becomes an HTTP-backed engine; anything else has no in-kernel
/// implementation and leaves the voice routes disabled.
pub fn resolve_stt(spec: &str) -> Option<std::sync::Arc<dyn SttEngine>> {
    spec.starts_with("http")
        .then(|| HttpSttEngine::new(spec).ok())
        .flatten()
        .map(|e| std::sync::Arc::new(e) as std::sync::Arc<dyn SttEngine>)
}

pub fn resolve_tts(spec: &str) -> Option<std::sync::Arc<dyn TtsEngine>> {
    spec.starts_with("http")
        .then(|| HttpTtsEngine::new(spec).ok())
        .flatten()
        .map(|e| std::sync::Arc::new(e) as std::sync::Arc<dyn TtsEngine>)
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: String,
}

/// STT over a whisper-server-style HTTP endpoint: POST the WAV, get
/// `{"text": …}` back.
pub struct HttpSttEngine {
    http: reqwest::Client,
    url: String,
}

impl HttpSttEngine {
    pub fn new(url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl SttEngine for HttpSttEngine {
    fn name(&self) -> &str {
        "http-stt"
    }

    async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        let resp = self
            .http
            .post(&self.url)
            .header("content-type", "audio/wav")
            .body(wav.to_vec())
            .send()
            .await
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(VoiceError::Stt(format!("engine returned {}", resp.status())));
        }
        let body: TranscribeResponse = resp
            .json()
            .await
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        Ok(body.text)
    }
}

/// TTS over a piper-server-style HTTP endpoint: POST `{"text": …}`, get WAV
/// bytes back.
pub struct HttpTtsEngine {
    http: reqwest::Client,
    url: String,
}

impl HttpTtsEngine {
    pub fn new(url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(Self {
            http,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl TtsEngine for HttpTtsEngine {
    fn name(&self) -> &str {
        "http-tts"
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .post(&self.url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(VoiceError::Tts(format!("engine returned {}", resp.status())));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
