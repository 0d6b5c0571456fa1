use crate::{Detection, Frame, ModelError, Result};

pub trait CameraSource {
    /// Open a camera source by device index or path string.
    fn open(spec: &str) -> Result<Self>
    where
        Self: Sized;

    /// Read a single frame.
    fn read(&mut self) -> Result<Frame>;
}

/// A single-frame object detector.
///
/// Implementations should keep latency bounded; callers still wrap each call in a timeout
/// and treat any error as "nothing detected this frame".
pub trait DetectionModel {
    fn detect(&mut self, frame: &Frame) -> core::result::Result<Vec<Detection>, ModelError>;

    /// Short backend name for diagnostics.
    fn name(&self) -> &str {
        "detector"
    }
}
