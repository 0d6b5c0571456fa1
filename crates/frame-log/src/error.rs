use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = FrameLogError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum FrameLogError {
    #[error("I/O error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image encoding failed: {0}")]
    Encode(String),
    #[error("sidecar {}: {}", .path.display(), .source)]
    Sidecar {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid frame log configuration: {0}")]
    Config(&'static str),
}

impl FrameLogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
