use crate::{
    AsrStreamConfig, CommandClassifier, ConsoleWakeEngine, ProcessSpeech, SpeechCommand,
    SpeechEngine, TtsConfig, WakeWordEngine,
};
#[cfg(feature = "mock")]
use crate::{MockSpeech, MockWakeEngine};
use std::time::Duration;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WakeBackendKind {
    Mock,
    Console,
    Transcript,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SpeechBackendKind {
    Mock,
    Espeak,
    Piper,
}

/// A wake engine plus whatever must stay alive alongside it (e.g. the microphone thread).
pub struct WakeBackend {
    pub engine: Box<dyn WakeWordEngine + Send>,
    #[cfg(feature = "audio")]
    pub mic: Option<crate::mic::MicCapture>,
}

impl WakeBackend {
    fn engine_only(engine: Box<dyn WakeWordEngine + Send>) -> Self {
        Self {
            engine,
            #[cfg(feature = "audio")]
            mic: None,
        }
    }
}

pub fn new_wake_backend(kind: WakeBackendKind, cfg: AsrStreamConfig) -> Result<WakeBackend, String> {
    let classifier = CommandClassifier::new(&cfg.wake_words).map_err(|e| e.to_string())?;
    match kind {
        WakeBackendKind::Mock => {
            #[cfg(feature = "mock")]
            {
                let _ = classifier;
                Ok(WakeBackend::engine_only(Box::new(MockWakeEngine::new(
                    Vec::new(),
                ))))
            }
            #[cfg(not(feature = "mock"))]
            {
                let _ = classifier;
                Err("mock feature not enabled".into())
            }
        }
        WakeBackendKind::Console => ConsoleWakeEngine::stdin(classifier)
            .map(|e| WakeBackend::engine_only(Box::new(e)))
            .map_err(|e| e.to_string()),
        WakeBackendKind::Transcript => {
            let _ = classifier;
            Err("transcript backend needs a speech recogniser; none is integrated yet".into())
        }
    }
}

/// Microphone feeding `A`, with each released transcript run through the command classifier.
#[cfg(feature = "audio")]
pub fn transcript_wake_backend<A>(cfg: AsrStreamConfig) -> Result<WakeBackend, String>
where
    A: crate::AsrStream + Send + 'static,
{
    let classifier = CommandClassifier::new(&cfg.wake_words).map_err(|e| e.to_string())?;
    let (mic, mic_cfg, rx) = crate::mic::start_default_input_i16().map_err(|e| e.to_string())?;
    let asr = A::new(AsrStreamConfig {
        sample_rate_hz: mic_cfg.sample_rate_hz,
        ..cfg
    });
    Ok(WakeBackend {
        engine: Box::new(crate::TranscriptWakeEngine::new(asr, rx, classifier)),
        mic: Some(mic),
    })
}

pub fn new_speech_backend(
    kind: SpeechBackendKind,
    cfg: &TtsConfig,
) -> Result<Box<dyn SpeechEngine + Send>, String> {
    match kind {
        SpeechBackendKind::Mock => {
            #[cfg(feature = "mock")]
            {
                Ok(Box::new(MockSpeech::timed(Duration::from_millis(60))))
            }
            #[cfg(not(feature = "mock"))]
            {
                let _ = Duration::ZERO;
                Err("mock feature not enabled".into())
            }
        }
        SpeechBackendKind::Espeak => {
            let voice = cfg.voice.clone().unwrap_or_else(|| "en+f1".to_string());
            ProcessSpeech::new(SpeechCommand::Espeak { voice })
                .map(|s| Box::new(s) as Box<dyn SpeechEngine + Send>)
                .map_err(|e| e.to_string())
        }
        SpeechBackendKind::Piper => {
            let model = cfg
                .model_path
                .clone()
                .ok_or_else(|| "piper backend needs a model path".to_string())?;
            ProcessSpeech::new(SpeechCommand::Piper { model })
                .map(|s| Box::new(s) as Box<dyn SpeechEngine + Send>)
                .map_err(|e| e.to_string())
        }
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;

    #[test]
    fn test_mock_backends_build() {
        let cfg = AsrStreamConfig {
            language: None,
            sample_rate_hz: 16000,
            wake_words: vec!["hey buddy".into()],
        };
        assert!(new_wake_backend(WakeBackendKind::Mock, cfg).is_ok());
        let mut speech = new_speech_backend(SpeechBackendKind::Mock, &TtsConfig::default()).unwrap();
        assert!(speech.is_idle());
    }

    #[test]
    fn test_transcript_backend_refuses_without_recogniser() {
        let cfg = AsrStreamConfig {
            language: None,
            sample_rate_hz: 16000,
            wake_words: vec!["hey buddy".into()],
        };
        let err = new_wake_backend(WakeBackendKind::Transcript, cfg).err().unwrap();
        assert!(err.contains("recogniser"));
    }

    #[test]
    fn test_piper_without_model_fails() {
        assert!(new_speech_backend(SpeechBackendKind::Piper, &TtsConfig::default()).is_err());
    }
}
