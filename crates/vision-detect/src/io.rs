use crate::annotate::to_rgb8;
use crate::{Error, Frame, PixelFormat, Result};

#[cfg(feature = "opencv")]
use opencv::{core, imgcodecs, prelude::*};

/// Encode a frame for the given file extension.
///
/// `ppm`/`pgm` are always available; `jpg`/`jpeg`/`png` need the `opencv` feature.
pub fn encode(frame: &Frame, extension: &str) -> Result<Vec<u8>> {
    match extension.to_ascii_lowercase().as_str() {
        "ppm" => encode_ppm(frame),
        "pgm" => encode_pgm(frame),
        #[cfg(feature = "opencv")]
        "jpg" | "jpeg" | "png" => encode_with_opencv(frame, extension),
        _ => Err(Error::Unsupported("image extension")),
    }
}

/// True when [`encode`] can write any annotated frame under `extension` in this build.
///
/// `pgm` is left out since it only takes grayscale frames.
pub fn supports_extension(extension: &str) -> bool {
    match extension.to_ascii_lowercase().as_str() {
        "ppm" => true,
        "jpg" | "jpeg" | "png" => cfg!(feature = "opencv"),
        _ => false,
    }
}

/// Binary PPM (P6); any pixel format is converted to RGB8 first.
pub fn encode_ppm(frame: &Frame) -> Result<Vec<u8>> {
    let rgb = to_rgb8(frame);
    if !rgb.is_well_formed() {
        return Err(Error::Backend("frame buffer does not match geometry".into()));
    }
    let mut out = format!("P6\n{} {}\n255\n", rgb.width, rgb.height).into_bytes();
    out.extend_from_slice(&rgb.data);
    Ok(out)
}

/// Binary PGM (P5); only grayscale frames are accepted.
pub fn encode_pgm(frame: &Frame) -> Result<Vec<u8>> {
    if frame.pixel_format != PixelFormat::Gray8 {
        return Err(Error::Unsupported("pgm requires Gray8 frames"));
    }
    if !frame.is_well_formed() {
        return Err(Error::Backend("frame buffer does not match geometry".into()));
    }
    let mut out = format!("P5\n{} {}\n255\n", frame.width, frame.height).into_bytes();
    out.extend_from_slice(&frame.data);
    Ok(out)
}

#[cfg(feature = "opencv")]
fn encode_with_opencv(frame: &Frame, extension: &str) -> Result<Vec<u8>> {
    let rgb = to_rgb8(frame);
    let mat = core::Mat::from_slice(&rgb.data).map_err(|e| Error::Backend(e.to_string()))?;
    let rgb_mat = mat
        .reshape(3, rgb.height as i32)
        .map_err(|e| Error::Backend(e.to_string()))?;
    let mut bgr = core::Mat::default();
    opencv::imgproc::cvt_color(&rgb_mat, &mut bgr, opencv::imgproc::COLOR_RGB2BGR, 0)
        .map_err(|e| Error::Backend(e.to_string()))?;
    let mut buf = core::Vector::<u8>::new();
    imgcodecs::imencode(
        &format!(".{extension}"),
        &bgr,
        &mut buf,
        &core::Vector::<i32>::new(),
    )
    .map_err(|e| Error::Backend(e.to_string()))?;
    Ok(buf.to_vec())
}
