use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = OrchestratorError> = core::result::Result<T, E>;

/// Everything that can go wrong inside one loop cycle.
///
/// None of these stop the loop: adapter failures and timeouts skip the cycle's input, and a
/// speech dispatch failure drops the announcement.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{adapter} did not answer within {timeout:?}")]
    AdapterTimeout {
        adapter: &'static str,
        timeout: Duration,
    },
    #[error("{adapter} call panicked: {reason}")]
    AdapterPanicked {
        adapter: &'static str,
        reason: String,
    },
    #[error("camera: {0}")]
    Camera(#[from] vision_detect::Error),
    #[error("detection model: {0}")]
    Model(#[from] vision_detect::ModelError),
    #[error("wake engine: {0}")]
    Engine(#[from] voice_local::EngineError),
    #[error("speech: {0}")]
    Speech(#[from] voice_local::SpeechError),
    #[error("frame encoding: {0}")]
    FrameEncode(vision_detect::Error),
    #[error("frame log: {0}")]
    FrameLog(#[from] frame_log::FrameLogError),
    #[error(transparent)]
    Config(#[from] crate::ConfigError),
}
