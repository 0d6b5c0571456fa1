use thiserror::Error;

/// Failures of a wake-word engine or its audio stream.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("audio device error: {0}")]
    Device(String),
    #[error("audio stream error: {0}")]
    Stream(String),
    #[error("audio source disconnected")]
    Disconnected,
    #[error("engine busy with a previous poll")]
    Busy,
}

/// Failures to start an utterance.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("speech dispatch failed: {0}")]
    Dispatch(String),
    #[error("speech backend unavailable: {0}")]
    Unavailable(String),
}
