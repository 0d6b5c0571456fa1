use crate::{CameraSource, Error, Frame, PixelFormat, Result};
use opencv::prelude::*;
use opencv::{core, videoio};
use time::OffsetDateTime;

fn backend(e: opencv::Error) -> Error {
    Error::Backend(e.to_string())
}

/// V4L2/OpenCV capture. Frames are handed out in the driver's native BGR order.
pub struct OpenCvCamera {
    cap: videoio::VideoCapture,
    device: String,
}

impl CameraSource for OpenCvCamera {
    fn open(spec: &str) -> Result<Self> {
        let mut cap = match spec.parse::<i32>() {
            Ok(index) => videoio::VideoCapture::new(index, videoio::CAP_ANY),
            Err(_) => videoio::VideoCapture::from_file(spec, videoio::CAP_ANY),
        }
        .map_err(backend)?;
        if !cap.is_opened().map_err(backend)? {
            return Err(Error::NotFound(spec.to_string()));
        }
        // Keep only the newest frame queued so a slow detector never sees stale scenes
        if let Err(e) = cap.set(videoio::CAP_PROP_BUFFERSIZE, 1.0) {
            tracing::debug!(device = spec, error = %e, "capture buffer size not adjustable");
        }
        tracing::info!(device = spec, "opencv camera opened");
        Ok(Self {
            cap,
            device: spec.to_string(),
        })
    }

    fn read(&mut self) -> Result<Frame> {
        let mut mat = core::Mat::default();
        let grabbed = self.cap.read(&mut mat).map_err(backend)?;
        if !grabbed || mat.empty() {
            return Err(Error::Io(format!("no frame from {}", self.device)));
        }
        if mat.channels() != 3 || !mat.is_continuous() {
            return Err(Error::Unsupported("camera must deliver packed 3-channel frames"));
        }
        Ok(Frame {
            width: mat.cols() as u32,
            height: mat.rows() as u32,
            pixel_format: PixelFormat::Bgr8,
            data: mat.data_bytes().map_err(backend)?.to_vec(),
            ts: Some(OffsetDateTime::now_utc()),
        })
    }
}
