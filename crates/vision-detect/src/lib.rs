//! vision-detect: camera and object-detection adapters
//!
//! The crate defines the two leaf adapters the runtime consumes on the vision side:
//! a [`CameraSource`] that yields frames and a [`DetectionModel`] that turns a frame into
//! labelled boxes. The default build enables `mock` backends so binaries compile on any host
//! without camera drivers or model runtimes.

mod types;
pub use types::{BoundingBox, Detection, Frame, PixelFormat};

mod error;
pub use error::{Error, ModelError, Result};

mod traits;
pub use traits::{CameraSource, DetectionModel};

#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "mock")]
pub use mock::{MockCamera, ScriptedDetector};

#[cfg(feature = "opencv")]
mod opencv_backend;
#[cfg(feature = "opencv")]
pub use opencv_backend::OpenCvCamera;

/// Box overlays drawn onto frames before they are logged
pub mod annotate;

/// Image encoders for annotated frames
pub mod io;
