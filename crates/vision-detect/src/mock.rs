use crate::{CameraSource, Detection, DetectionModel, Frame, ModelError, PixelFormat, Result};
use std::collections::VecDeque;
use time::OffsetDateTime;

pub struct MockCamera {
    counter: u64,
}

impl MockCamera {
    pub fn frames_read(&self) -> u64 {
        self.counter
    }
}

impl CameraSource for MockCamera {
    fn open(_spec: &str) -> Result<Self> {
        Ok(Self { counter: 0 })
    }

    fn read(&mut self) -> Result<Frame> {
        self.counter += 1;
        // Produce a simple gray ramp image
        let width = 320u32;
        let height = 240u32;
        let mut data = vec![0u8; (width * height) as usize];
        for y in 0..height {
            for x in 0..width {
                let idx = (y * width + x) as usize;
                data[idx] = ((x + y) % 256) as u8;
            }
        }
        Ok(Frame {
            width,
            height,
            pixel_format: PixelFormat::Gray8,
            data,
            ts: Some(OffsetDateTime::now_utc()),
        })
    }
}

/// Detector that replays a fixed script of batches, one per call.
///
/// Once the script is exhausted it returns empty batches, or starts over when built with
/// [`ScriptedDetector::looping`].
pub struct ScriptedDetector {
    script: VecDeque<Vec<Detection>>,
    original: Vec<Vec<Detection>>,
    looping: bool,
    calls: u64,
}

impl ScriptedDetector {
    pub fn new(batches: Vec<Vec<Detection>>) -> Self {
        Self {
            script: batches.iter().cloned().collect(),
            original: batches,
            looping: false,
            calls: 0,
        }
    }

    pub fn looping(batches: Vec<Vec<Detection>>) -> Self {
        Self {
            looping: true,
            ..Self::new(batches)
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectionModel for ScriptedDetector {
    fn detect(&mut self, frame: &Frame) -> core::result::Result<Vec<Detection>, ModelError> {
        self.calls += 1;
        if !frame.is_well_formed() {
            return Err(ModelError::MalformedInput(format!(
                "{}x{} {:?} frame carries {} bytes, expected {}",
                frame.width,
                frame.height,
                frame.pixel_format,
                frame.data.len(),
                frame.expected_len()
            )));
        }
        if self.script.is_empty() && self.looping {
            self.script.extend(self.original.iter().cloned());
        }
        Ok(self.script.pop_front().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundingBox;

    fn det(label: &str) -> Detection {
        Detection::new(label, 0.9, BoundingBox::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn test_mock_camera_frame_is_well_formed() {
        let mut cam = MockCamera::open("0").unwrap();
        let frame = cam.read().unwrap();
        assert!(frame.is_well_formed());
        assert_eq!(cam.frames_read(), 1);
    }

    #[test]
    fn test_scripted_detector_plays_once() {
        let mut cam = MockCamera::open("0").unwrap();
        let frame = cam.read().unwrap();
        let mut model = ScriptedDetector::new(vec![vec![det("cup")], vec![det("chair")]]);
        assert_eq!(model.detect(&frame).unwrap()[0].label, "cup");
        assert_eq!(model.detect(&frame).unwrap()[0].label, "chair");
        assert!(model.detect(&frame).unwrap().is_empty());
        assert_eq!(model.calls(), 3);
    }

    #[test]
    fn test_scripted_detector_loops() {
        let mut cam = MockCamera::open("0").unwrap();
        let frame = cam.read().unwrap();
        let mut model = ScriptedDetector::looping(vec![vec![det("cup")]]);
        for _ in 0..3 {
            assert_eq!(model.detect(&frame).unwrap()[0].label, "cup");
        }
    }

    #[test]
    fn test_malformed_frame_is_rejected() {
        let frame = Frame {
            width: 10,
            height: 10,
            pixel_format: PixelFormat::Rgb8,
            data: vec![0; 5],
            ts: None,
        };
        let mut model = ScriptedDetector::new(vec![vec![det("cup")]]);
        assert!(matches!(
            model.detect(&frame),
            Err(ModelError::MalformedInput(_))
        ));
    }
}
