use crate::{Detection, Frame, PixelFormat};

const HAZARD_RGB: [u8; 3] = [255, 0, 0];
const OBJECT_RGB: [u8; 3] = [0, 255, 0];
const STROKE_PX: u32 = 2;

/// Convert any supported frame into packed RGB8.
pub fn to_rgb8(frame: &Frame) -> Frame {
    let data = match frame.pixel_format {
        PixelFormat::Rgb8 => frame.data.clone(),
        PixelFormat::Bgr8 => frame
            .data
            .chunks_exact(3)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect(),
        PixelFormat::Gray8 => frame.data.iter().flat_map(|&v| [v, v, v]).collect(),
    };
    Frame {
        width: frame.width,
        height: frame.height,
        pixel_format: PixelFormat::Rgb8,
        data,
        ts: frame.ts,
    }
}

/// Draw a rectangle outline for every detection; hazards in red, everything else in green.
///
/// Boxes are clipped to the frame. A malformed frame is returned unmodified (converted to RGB8).
pub fn annotate(frame: &Frame, detections: &[Detection]) -> Frame {
    let mut out = to_rgb8(frame);
    if !out.is_well_formed() {
        return out;
    }
    for det in detections {
        let color = if det.is_hazard { HAZARD_RGB } else { OBJECT_RGB };
        draw_rect(&mut out, det, color);
    }
    out
}

fn draw_rect(frame: &mut Frame, det: &Detection, color: [u8; 3]) {
    let (w, h) = (frame.width as i64, frame.height as i64);
    let x0 = (det.bbox.x.floor() as i64).clamp(0, w - 1);
    let y0 = (det.bbox.y.floor() as i64).clamp(0, h - 1);
    let x1 = ((det.bbox.x + det.bbox.w).ceil() as i64 - 1).clamp(0, w - 1);
    let y1 = ((det.bbox.y + det.bbox.h).ceil() as i64 - 1).clamp(0, h - 1);
    if x1 < x0 || y1 < y0 {
        return;
    }
    let stroke = STROKE_PX as i64;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let on_edge =
                x - x0 < stroke || x1 - x < stroke || y - y0 < stroke || y1 - y < stroke;
            if on_edge {
                let idx = ((y * w + x) * 3) as usize;
                frame.data[idx..idx + 3].copy_from_slice(&color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundingBox;

    fn gray(width: u32, height: u32) -> Frame {
        Frame {
            width,
            height,
            pixel_format: PixelFormat::Gray8,
            data: vec![10; (width * height) as usize],
            ts: None,
        }
    }

    fn px(frame: &Frame, x: u32, y: u32) -> [u8; 3] {
        let idx = ((y * frame.width + x) * 3) as usize;
        [frame.data[idx], frame.data[idx + 1], frame.data[idx + 2]]
    }

    #[test]
    fn test_gray_expands_to_rgb() {
        let out = to_rgb8(&gray(2, 2));
        assert_eq!(out.pixel_format, PixelFormat::Rgb8);
        assert_eq!(out.data, vec![10; 12]);
    }

    #[test]
    fn test_bgr_is_swapped() {
        let frame = Frame {
            width: 1,
            height: 1,
            pixel_format: PixelFormat::Bgr8,
            data: vec![1, 2, 3],
            ts: None,
        };
        assert_eq!(to_rgb8(&frame).data, vec![3, 2, 1]);
    }

    #[test]
    fn test_outline_colors() {
        let dets = vec![
            Detection::new("knife", 0.9, BoundingBox::new(0.0, 0.0, 10.0, 10.0)).with_hazard(true),
            Detection::new("cup", 0.9, BoundingBox::new(20.0, 20.0, 10.0, 10.0)),
        ];
        let out = annotate(&gray(40, 40), &dets);
        assert_eq!(px(&out, 0, 0), HAZARD_RGB);
        assert_eq!(px(&out, 20, 25), OBJECT_RGB);
        // Interior untouched
        assert_eq!(px(&out, 5, 5), [10, 10, 10]);
    }

    #[test]
    fn test_box_outside_frame_is_clipped() {
        let dets = vec![Detection::new(
            "car",
            0.9,
            BoundingBox::new(-50.0, 30.0, 500.0, 500.0),
        )];
        let out = annotate(&gray(40, 40), &dets);
        assert_eq!(px(&out, 0, 39), OBJECT_RGB);
    }
}
