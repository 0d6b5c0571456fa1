//! voice-local: offline wake-word, command and speech adapters
//!
//! Two capability traits face the runtime: [`WakeWordEngine`] pushes discrete wake and
//! command events, [`SpeechEngine`] plays one utterance at a time and can be stopped
//! mid-sentence. Transcript-producing recognisers plug in underneath through [`AsrStream`]
//! and the regex [`CommandClassifier`].

mod types;
pub use types::{AsrSegment, AsrStreamConfig, SpeechHandle, TtsConfig, WakeEvent, WakeEventKind};

mod error;
pub use error::{EngineError, SpeechError};

mod traits;
pub use traits::{AsrStream, SpeechEngine, WakeWordEngine};

mod commands;
pub use commands::{CommandClassifier, DEFAULT_WAKE_PHRASE};

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "mock")]
pub use mock::{MockAsr, MockSpeech, MockSpeechProbe, MockStep, MockWakeEngine};

mod transcript;
pub use transcript::TranscriptWakeEngine;

mod console;
pub use console::ConsoleWakeEngine;

mod process_tts;
pub use process_tts::{ProcessSpeech, SpeechCommand};

#[cfg(feature = "audio")]
pub mod mic;

pub mod plugin;
