#![allow(clippy::new_without_default)]
//! orchestrator: the Buddy Core control loop
//!
//! Three independent activities feed this crate: camera capture plus detection, wake-word
//! listening, and speech playback. The [`Orchestrator`] serialises their output through one
//! loop that owns the operating [`Mode`], the two-class [`AnnouncementQueue`] and the
//! Idle/Speaking playback state, so no lock guards either.
//!
//! - [`risk`] normalises hazard flags against the configured label set and coalesces a
//!   batch into one utterance
//! - [`recorder`] writes every batch to the frame log on a blocking thread
//! - [`pipeline`] runs the capture activities and bounds every adapter call with a timeout
//! - [`watchdog`] turns repeated adapter failures into a spoken fault notice
//! - [`runtime`] wires channels, pipelines and the orchestrator into the async main loop

mod error;
pub use error::{OrchestratorError, Result};

pub mod config;
pub use config::{BuddyConfig, ConfigError};

mod mode;
pub use mode::Mode;

mod announcement;
pub use announcement::{Announcement, Priority};

mod queue;
pub use queue::AnnouncementQueue;

pub mod risk;
pub use risk::{Coalesced, HazardClassifier};

mod control;
pub use control::{DetectionBatch, Orchestrator, OrchestratorStats, PlaybackState};

pub mod recorder;
pub use recorder::{FrameJob, FrameRecorder};

mod bounded;
pub use bounded::bounded_call;

pub mod watchdog;
pub use watchdog::{Subsystem, SubsystemFault, SubsystemWatchdog};

pub mod pipeline;

pub mod runtime;
pub use runtime::{run, Adapters};
