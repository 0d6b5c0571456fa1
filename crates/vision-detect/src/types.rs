use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PixelFormat {
    Bgr8,
    Rgb8,
    Gray8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Bgr8 | PixelFormat::Rgb8 => 3,
            PixelFormat::Gray8 => 1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub data: Vec<u8>,
    pub ts: Option<OffsetDateTime>,
}

impl Frame {
    /// Number of bytes a well-formed frame of this geometry carries.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.pixel_format.channels()
    }

    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0 && self.data.len() == self.expected_len()
    }
}

/// Axis-aligned box in frame-pixel coordinates, origin at the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }
}

/// One labelled object found in a single frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// Model score clamped to `[0, 1]`
    pub confidence: f32,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    #[serde(default)]
    pub is_hazard: bool,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            label: label.into(),
            confidence,
            bbox,
            is_hazard: false,
        }
    }

    pub fn with_hazard(mut self, is_hazard: bool) -> Self {
        self.is_hazard = is_hazard;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        let b = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(Detection::new("cup", 1.7, b).confidence, 1.0);
        assert_eq!(Detection::new("cup", -0.2, b).confidence, 0.0);
        assert_eq!(Detection::new("cup", f32::NAN, b).confidence, 0.0);
    }

    #[test]
    fn test_box_serializes_under_box_key() {
        let d = Detection::new("knife", 0.8, BoundingBox::new(1.0, 2.0, 3.0, 4.0)).with_hazard(true);
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["box"]["w"], 3.0);
        assert_eq!(json["is_hazard"], true);
    }

    #[test]
    fn test_frame_geometry() {
        let frame = Frame {
            width: 4,
            height: 2,
            pixel_format: PixelFormat::Rgb8,
            data: vec![0; 24],
            ts: None,
        };
        assert!(frame.is_well_formed());
        let short = Frame {
            data: vec![0; 10],
            ..frame
        };
        assert!(!short.is_well_formed());
    }
}
