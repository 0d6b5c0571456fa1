use crate::{
    AsrSegment, AsrStream, AsrStreamConfig, EngineError, SpeechEngine, SpeechError, SpeechHandle,
    WakeEvent, WakeWordEngine,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

/// Recogniser that hands out one scripted transcript per pushed audio chunk.
pub struct MockAsr {
    _cfg: AsrStreamConfig,
    transcripts: VecDeque<String>,
    ready: VecDeque<String>,
    counter: u64,
}

impl MockAsr {
    pub fn with_transcripts(config: AsrStreamConfig, transcripts: Vec<String>) -> Self {
        Self {
            _cfg: config,
            transcripts: transcripts.into(),
            ready: VecDeque::new(),
            counter: 0,
        }
    }
}

impl AsrStream for MockAsr {
    fn new(config: AsrStreamConfig) -> Self
    where
        Self: Sized,
    {
        Self::with_transcripts(config, Vec::new())
    }

    fn push_audio(&mut self, _pcm_s16le: &[i16]) {
        if let Some(next) = self.transcripts.pop_front() {
            self.ready.push_back(next);
        }
    }

    fn poll(&mut self) -> Option<AsrSegment> {
        let text = self.ready.pop_front()?;
        let idx = self.counter;
        self.counter += 1;
        Some(AsrSegment {
            start_ms: idx * 1000,
            end_ms: (idx + 1) * 1000,
            text,
            ts: Some(OffsetDateTime::now_utc()),
        })
    }
}

/// One scripted reaction of [`MockWakeEngine`].
#[derive(Clone, Debug)]
pub enum MockStep {
    Event(WakeEvent),
    /// Nothing heard within the poll timeout
    Silence,
    Fail(String),
    /// Block for the given time before reporting silence, ignoring the poll timeout
    Stall(Duration),
}

/// Wake engine replaying a script; silent once the script runs out.
pub struct MockWakeEngine {
    steps: VecDeque<MockStep>,
}

impl MockWakeEngine {
    pub fn new(steps: Vec<MockStep>) -> Self {
        Self {
            steps: steps.into(),
        }
    }

    pub fn from_events(events: Vec<WakeEvent>) -> Self {
        Self::new(events.into_iter().map(MockStep::Event).collect())
    }
}

impl WakeWordEngine for MockWakeEngine {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<WakeEvent>, EngineError> {
        match self.steps.pop_front() {
            Some(MockStep::Event(event)) => Ok(Some(event)),
            Some(MockStep::Fail(msg)) => Err(EngineError::Stream(msg)),
            Some(MockStep::Stall(d)) => {
                std::thread::sleep(d);
                Ok(None)
            }
            Some(MockStep::Silence) | None => {
                std::thread::sleep(timeout);
                Ok(None)
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[derive(Default)]
struct SpeechLog {
    spoken: Vec<String>,
    stopped: Vec<String>,
    current: Option<(SpeechHandle, String, Instant)>,
    fail_next: bool,
}

/// In-memory speech engine for tests and headless runs.
///
/// Utterances finish after a simulated duration when built with [`MockSpeech::timed`];
/// otherwise they play until [`MockSpeechProbe::finish`] is called.
pub struct MockSpeech {
    state: Arc<Mutex<SpeechLog>>,
    next_id: u64,
    per_char: Option<Duration>,
}

impl MockSpeech {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SpeechLog::default())),
            next_id: 0,
            per_char: None,
        }
    }

    pub fn timed(per_char: Duration) -> Self {
        Self {
            per_char: Some(per_char),
            ..Self::new()
        }
    }

    pub fn probe(&self) -> MockSpeechProbe {
        MockSpeechProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockSpeech {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechEngine for MockSpeech {
    fn speak(&mut self, text: &str) -> Result<SpeechHandle, SpeechError> {
        let mut state = self.state.lock();
        if state.fail_next {
            state.fail_next = false;
            return Err(SpeechError::Dispatch("scripted failure".into()));
        }
        if let Some((_, text, _)) = state.current.take() {
            state.stopped.push(text);
        }
        self.next_id += 1;
        let handle = SpeechHandle(self.next_id);
        tracing::debug!(text, "mock speech");
        state.spoken.push(text.to_string());
        state.current = Some((handle, text.to_string(), Instant::now()));
        Ok(handle)
    }

    fn stop(&mut self, handle: SpeechHandle) {
        let mut state = self.state.lock();
        if matches!(&state.current, Some((h, _, _)) if *h == handle) {
            if let Some((_, text, _)) = state.current.take() {
                state.stopped.push(text);
            }
        }
    }

    fn is_idle(&mut self) -> bool {
        let mut state = self.state.lock();
        let finished = match (self.per_char, &state.current) {
            (Some(per_char), Some((_, text, started))) => {
                started.elapsed() >= per_char * text.chars().count() as u32
            }
            _ => false,
        };
        if finished {
            state.current = None;
        }
        state.current.is_none()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Shared view into a [`MockSpeech`] for assertions and manual completion.
#[derive(Clone)]
pub struct MockSpeechProbe {
    state: Arc<Mutex<SpeechLog>>,
}

impl MockSpeechProbe {
    /// Every utterance started, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.state.lock().spoken.clone()
    }

    /// Utterances cut off before they finished.
    pub fn stopped(&self) -> Vec<String> {
        self.state.lock().stopped.clone()
    }

    pub fn current(&self) -> Option<String> {
        self.state.lock().current.as_ref().map(|(_, t, _)| t.clone())
    }

    /// Complete the current utterance as if playback reached its end.
    pub fn finish(&self) {
        self.state.lock().current = None;
    }

    pub fn fail_next(&self) {
        self.state.lock().fail_next = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_speech_manual_finish() {
        let mut speech = MockSpeech::new();
        let probe = speech.probe();
        assert!(speech.is_idle());
        let h = speech.speak("hello").unwrap();
        assert!(!speech.is_idle());
        assert_eq!(probe.current().as_deref(), Some("hello"));
        probe.finish();
        assert!(speech.is_idle());
        // Stale handle is ignored
        speech.stop(h);
        assert!(probe.stopped().is_empty());
    }

    #[test]
    fn test_mock_speech_stop_records_interruption() {
        let mut speech = MockSpeech::new();
        let probe = speech.probe();
        let h = speech.speak("long sentence").unwrap();
        speech.stop(h);
        assert!(speech.is_idle());
        assert_eq!(probe.stopped(), vec!["long sentence".to_string()]);
    }

    #[test]
    fn test_mock_speech_timed_completion() {
        let mut speech = MockSpeech::timed(Duration::from_millis(1));
        speech.speak("hi").unwrap();
        std::thread::sleep(Duration::from_millis(10));
        assert!(speech.is_idle());
    }

    #[test]
    fn test_mock_speech_scripted_failure() {
        let mut speech = MockSpeech::new();
        speech.probe().fail_next();
        assert!(speech.speak("x").is_err());
        assert!(speech.speak("y").is_ok());
    }

    #[test]
    fn test_mock_wake_engine_script() {
        let mut engine = MockWakeEngine::new(vec![
            MockStep::Event(WakeEvent::wake_phrase()),
            MockStep::Fail("mic unplugged".into()),
        ]);
        let t = Duration::from_millis(1);
        assert!(engine.next_event(t).unwrap().is_some());
        assert!(engine.next_event(t).is_err());
        assert!(engine.next_event(t).unwrap().is_none());
    }

    #[test]
    fn test_mock_asr_releases_after_audio() {
        let cfg = AsrStreamConfig {
            language: None,
            sample_rate_hz: 16000,
            wake_words: vec![],
        };
        let mut asr = MockAsr::with_transcripts(cfg, vec!["hey buddy".into()]);
        assert!(asr.poll().is_none());
        asr.push_audio(&[0; 160]);
        assert_eq!(asr.poll().map(|s| s.text).as_deref(), Some("hey buddy"));
    }
}
