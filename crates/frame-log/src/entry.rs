use crate::{FrameLogError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use time::OffsetDateTime;
use vision_detect::Detection;

/// What the caller hands to [`crate::FrameLog::record`].
#[derive(Clone, Debug)]
pub struct FrameRecord {
    pub captured_at: OffsetDateTime,
    pub monotonic: Instant,
    /// Encoded, annotated image
    pub image: Vec<u8>,
    pub detections: Vec<Detection>,
}

/// A retained snapshot. The image stays on disk; the sidecar mirrors everything else.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrameLogEntry {
    pub stem: String,
    /// Write order across restarts; the wall clock may step backwards between boots
    #[serde(default)]
    pub sequence: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
    /// Only known for entries recorded by this process
    #[serde(skip)]
    pub monotonic: Option<Instant>,
    pub image_file: String,
    pub detections: Vec<Detection>,
    #[serde(skip)]
    pub(crate) dir: PathBuf,
}

impl FrameLogEntry {
    pub fn image_path(&self) -> PathBuf {
        self.dir.join(&self.image_file)
    }

    pub fn sidecar_path(&self) -> PathBuf {
        sidecar_path(&self.dir, &self.stem)
    }

    pub fn read_image(&self) -> Result<Vec<u8>> {
        let path = self.image_path();
        std::fs::read(&path).map_err(|e| FrameLogError::io(path, e))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.detections.iter().map(|d| d.label.as_str())
    }
}

pub(crate) fn sidecar_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{stem}.json"))
}
