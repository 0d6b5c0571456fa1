use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrStreamConfig {
    pub language: Option<String>,
    pub sample_rate_hz: u32,
    #[serde(default)]
    pub wake_words: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsrSegment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    pub ts: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtsConfig {
    /// espeak voice name, e.g. `en+f1`
    pub voice: Option<String>,
    /// Piper `.onnx` voice model
    pub model_path: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum WakeEventKind {
    WakePhrase,
    ModeSwitchCommand,
    StopCommand,
    ScanCommand,
    ShutdownCommand,
    Unknown,
}

/// A discrete event pushed by a [`crate::WakeWordEngine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WakeEvent {
    pub kind: WakeEventKind,
    /// Mode target for mode switches, the raw transcript for unknown events.
    pub payload: Option<String>,
    pub ts: Option<OffsetDateTime>,
}

impl WakeEvent {
    pub fn new(kind: WakeEventKind, payload: Option<String>) -> Self {
        Self {
            kind,
            payload,
            ts: Some(OffsetDateTime::now_utc()),
        }
    }

    pub fn wake_phrase() -> Self {
        Self::new(WakeEventKind::WakePhrase, None)
    }

    pub fn mode_switch(target: Option<&str>) -> Self {
        Self::new(WakeEventKind::ModeSwitchCommand, target.map(str::to_string))
    }

    pub fn stop() -> Self {
        Self::new(WakeEventKind::StopCommand, None)
    }

    pub fn scan() -> Self {
        Self::new(WakeEventKind::ScanCommand, None)
    }

    pub fn shutdown() -> Self {
        Self::new(WakeEventKind::ShutdownCommand, None)
    }

    pub fn unknown(text: impl Into<String>) -> Self {
        Self::new(WakeEventKind::Unknown, Some(text.into()))
    }
}

/// Identifies one utterance handed to a [`crate::SpeechEngine`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SpeechHandle(pub u64);
