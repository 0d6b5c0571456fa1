use crate::{AsrStream, CommandClassifier, EngineError, WakeEvent, WakeWordEngine};
use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Wake engine built from a streaming recogniser and the command classifier.
///
/// Audio chunks arrive on a bounded channel fed by the capture thread; every transcript the
/// recogniser releases is classified and queued as events.
pub struct TranscriptWakeEngine<A: AsrStream> {
    asr: A,
    audio_rx: Receiver<Vec<i16>>,
    classifier: CommandClassifier,
    pending: VecDeque<WakeEvent>,
}

impl<A: AsrStream> TranscriptWakeEngine<A> {
    pub fn new(asr: A, audio_rx: Receiver<Vec<i16>>, classifier: CommandClassifier) -> Self {
        Self {
            asr,
            audio_rx,
            classifier,
            pending: VecDeque::new(),
        }
    }

    fn drain_segments(&mut self) {
        while let Some(segment) = self.asr.poll() {
            debug!(text = %segment.text, "transcript");
            self.pending.extend(self.classifier.classify(&segment.text));
        }
    }
}

impl<A: AsrStream> WakeWordEngine for TranscriptWakeEngine<A> {
    fn next_event(&mut self, timeout: Duration) -> Result<Option<WakeEvent>, EngineError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match self.audio_rx.recv_timeout(remaining) {
                Ok(chunk) => {
                    self.asr.push_audio(&chunk);
                    self.drain_segments();
                }
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(EngineError::Disconnected),
            }
        }
    }

    fn name(&self) -> &str {
        "transcript"
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::{AsrStreamConfig, MockAsr, WakeEventKind};
    use std::sync::mpsc::sync_channel;

    fn engine(
        transcripts: Vec<&str>,
    ) -> (
        TranscriptWakeEngine<MockAsr>,
        std::sync::mpsc::SyncSender<Vec<i16>>,
    ) {
        let cfg = AsrStreamConfig {
            language: Some("en".into()),
            sample_rate_hz: 16000,
            wake_words: vec!["hey buddy".into()],
        };
        let asr = MockAsr::with_transcripts(
            cfg.clone(),
            transcripts.into_iter().map(String::from).collect(),
        );
        let (tx, rx) = sync_channel(4);
        let classifier = CommandClassifier::new(&cfg.wake_words).unwrap();
        (TranscriptWakeEngine::new(asr, rx, classifier), tx)
    }

    #[test]
    fn test_transcript_yields_wake_then_command() {
        let (mut engine, tx) = engine(vec!["hey buddy hazard mode"]);
        tx.send(vec![0; 320]).unwrap();
        let t = Duration::from_millis(50);
        assert_eq!(
            engine.next_event(t).unwrap().map(|e| e.kind),
            Some(WakeEventKind::WakePhrase)
        );
        assert_eq!(
            engine.next_event(t).unwrap().map(|e| e.kind),
            Some(WakeEventKind::ModeSwitchCommand)
        );
        assert!(engine.next_event(t).unwrap().is_none());
    }

    #[test]
    fn test_disconnected_audio_is_an_error() {
        let (mut engine, tx) = engine(vec![]);
        drop(tx);
        assert!(matches!(
            engine.next_event(Duration::from_millis(10)),
            Err(EngineError::Disconnected)
        ));
    }
}
