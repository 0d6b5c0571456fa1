//! frame-log: bounded on-disk ring of annotated detection snapshots
//!
//! Every detection pass lands here regardless of what was spoken, so the last
//! `capacity` frames can be audited after the fact. Each entry is an encoded image plus a
//! JSON sidecar sharing the `[DETECTED]YYYY-MM-DD-HH-MM-SS` stem; the oldest pair is
//! deleted once the ring is full.

mod error;
pub use error::{FrameLogError, Result};

mod entry;
pub use entry::{FrameLogEntry, FrameRecord};

mod naming;
pub use naming::{stem_for, STEM_PREFIX};

mod store;
pub use store::{FrameLog, DEFAULT_CAPACITY};
