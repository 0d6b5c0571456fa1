use crate::{AsrSegment, AsrStreamConfig, EngineError, SpeechError, SpeechHandle, WakeEvent};
use std::time::Duration;

/// Streaming recogniser turning PCM audio into transcript segments.
pub trait AsrStream {
    fn new(config: AsrStreamConfig) -> Self
    where
        Self: Sized;
    fn push_audio(&mut self, pcm_s16le: &[i16]);
    fn poll(&mut self) -> Option<AsrSegment>;
}

/// Push-style wake-phrase and command detector.
pub trait WakeWordEngine {
    /// Wait at most `timeout` for the next event; `Ok(None)` means nothing was heard.
    fn next_event(&mut self, timeout: Duration) -> Result<Option<WakeEvent>, EngineError>;

    fn name(&self) -> &str {
        "wake"
    }
}

/// Text-to-speech output that plays one utterance at a time.
///
/// `speak` must return as soon as playback has started; completion is observed through
/// `is_idle`.
pub trait SpeechEngine {
    fn speak(&mut self, text: &str) -> Result<SpeechHandle, SpeechError>;

    /// Abort the utterance if it is still playing. Stale handles are ignored.
    fn stop(&mut self, handle: SpeechHandle);

    fn is_idle(&mut self) -> bool;

    fn name(&self) -> &str {
        "speech"
    }
}

impl<T: WakeWordEngine + ?Sized> WakeWordEngine for Box<T> {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<WakeEvent>, EngineError> {
        (**self).next_event(timeout)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<T: SpeechEngine + ?Sized> SpeechEngine for Box<T> {
    fn speak(&mut self, text: &str) -> Result<SpeechHandle, SpeechError> {
        (**self).speak(text)
    }

    fn stop(&mut self, handle: SpeechHandle) {
        (**self).stop(handle)
    }

    fn is_idle(&mut self) -> bool {
        (**self).is_idle()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
