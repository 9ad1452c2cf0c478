//! The voice request pipeline.
//!
//! One request at a time: transcribe, switch the router to the voice
//! channel, inject the transcript as the primary's input, then wait on the
//! pending-voice slot for the next assistant message (hard 30 s), and
//! synthesize the reply.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use majordomo_channels::{ChannelError, Router, Selection};
use majordomo_core::config::VOICE_WAIT_SECS;
use majordomo_session::SessionBridge;

use crate::engines::{SttEngine, TtsEngine};
use crate::error::{Result, VoiceError};

/// Seam over the session bridge so the pipeline can be exercised without a
/// live tmux server.
#[async_trait]
pub trait Injector: Send + Sync {
    async fn inject(&self, text: &str) -> bool;
}

#[async_trait]
impl Injector for SessionBridge {
    async fn inject(&self, text: &str) -> bool {
        self.inject_text(text, true).await
    }
}

#[derive(Debug, Clone)]
pub struct VoiceReply {
    /// What the assistant said, as text.
    pub text: String,
    /// Synthesized audio (WAV).
    pub audio: Vec<u8>,
}

pub struct VoicePipeline {
    stt: Arc<dyn SttEngine>,
    tts: Arc<dyn TtsEngine>,
    injector: Arc<dyn Injector>,
    router: Arc<Router>,
    response_deadline: Duration,
}

impl VoicePipeline {
    pub fn new(
        stt: Arc<dyn SttEngine>,
        tts: Arc<dyn TtsEngine>,
        injector: Arc<dyn Injector>,
        router: Arc<Router>,
    ) -> Self {
        Self {
            stt,
            tts,
            injector,
            router,
            response_deadline: Duration::from_secs(VOICE_WAIT_SECS),
        }
    }

    /// Shorten the response wait (tests).
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.response_deadline = deadline;
        self
    }

    /// Transcription only — used by the raw `/voice/stt` route.
    pub async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        self.stt.transcribe(wav).await
    }

    /// Synthesis only — used by the `/voice/speak` route.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        self.tts.synthesize(text).await
    }

    /// Full round trip for one utterance.
    pub async fn handle_utterance(&self, wav: &[u8]) -> Result<VoiceReply> {
        let transcript = self
            .stt
            .transcribe(wav)
            .await
            .map_err(|e| VoiceError::Stt(e.to_string()))?;
        info!(engine = self.stt.name(), chars = transcript.len(), "utterance transcribed");

        self.router.set_channel(Selection::Voice);

        // Install the resolver before injecting so a fast response can't
        // slip past between inject and wait.
        let rx = match self.router.pending_voice().register() {
            Ok(rx) => rx,
            Err(ChannelError::VoiceBusy) => return Err(VoiceError::Busy),
            Err(e) => return Err(VoiceError::Stt(e.to_string())),
        };

        if !self.injector.inject(&transcript).await {
            self.router.pending_voice().clear();
            return Err(VoiceError::InjectFailed);
        }

        let text = match tokio::time::timeout(self.response_deadline, rx).await {
            Ok(Ok(text)) => text,
            Ok(Err(_)) | Err(_) => {
                self.router.pending_voice().clear();
                warn!("voice response deadline passed");
                return Err(VoiceError::ResponseTimeout);
            }
        };

        let audio = self
            .tts
            .synthesize(&text)
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(VoiceReply { text, audio })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeStt;

    #[async_trait]
    impl SttEngine for FakeStt {
        fn name(&self) -> &str {
            "fake-stt"
        }

        async fn transcribe(&self, _wav: &[u8]) -> Result<String> {
            Ok("what's on my calendar".to_string())
        }
    }

    struct FakeTts;

    #[async_trait]
    impl TtsEngine for FakeTts {
        fn name(&self) -> &str {
            "fake-tts"
        }

        async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
            Ok(text.as_bytes().to_vec())
        }
    }

    struct FakeInjector {
        ok: AtomicBool,
    }

    #[async_trait]
    impl Injector for FakeInjector {
        async fn inject(&self, _text: &str) -> bool {
            self.ok.load(Ordering::SeqCst)
        }
    }

    fn pipeline(
        dir: &tempfile::TempDir,
        inject_ok: bool,
    ) -> (VoicePipeline, Arc<Router>) {
        let router = Arc::new(Router::new(dir.path().join("channel")));
        let p = VoicePipeline::new(
            Arc::new(FakeStt),
            Arc::new(FakeTts),
            Arc::new(FakeInjector {
                ok: AtomicBool::new(inject_ok),
            }),
            Arc::clone(&router),
        )
        .with_deadline(Duration::from_millis(200));
        (p, router)
    }

    #[tokio::test]
    async fn utterance_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, router) = pipeline(&dir, true);

        let router2 = Arc::clone(&router);
        tokio::spawn(async move {
            // The transcript stream delivers the next assistant message.
            tokio::time::sleep(Duration::from_millis(50)).await;
            router2.route_assistant_message("Two meetings today.").await.unwrap();
        });

        let reply = pipeline.handle_utterance(b"fake wav").await.unwrap();
        assert_eq!(reply.text, "Two meetings today.");
        assert_eq!(reply.audio, b"Two meetings today.".to_vec());
        assert_eq!(router.channel(), Selection::Voice);
    }

    #[tokio::test]
    async fn timeout_clears_pending_and_reports_the_contract_message() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, router) = pipeline(&dir, true);

        let err = pipeline.handle_utterance(b"fake wav").await.unwrap_err();
        assert_eq!(err.to_string(), "Claude did not respond within 30 seconds");
        assert!(!router.pending_voice().is_pending());
    }

    #[tokio::test]
    async fn failed_inject_clears_the_pending_slot() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, router) = pipeline(&dir, false);

        let err = pipeline.handle_utterance(b"fake wav").await.unwrap_err();
        assert!(matches!(err, VoiceError::InjectFailed));
        assert!(!router.pending_voice().is_pending());
    }
}
