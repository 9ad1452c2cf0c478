//! Voice channel — STT/TTS engine contracts and the transcribe → inject →
//! capture-response → synthesize pipeline.

pub mod adapter;
pub mod engines;
pub mod error;
pub mod pipeline;

pub use adapter::{ClientRegistration, VoiceAdapter};
pub use engines::{resolve_stt, resolve_tts, SttEngine, TtsEngine};
pub use error::{Result, VoiceError};
pub use pipeline::{Injector, VoicePipeline, VoiceReply};
