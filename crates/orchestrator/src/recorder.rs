//! Frame logging off the control loop
//!
//! Annotating, encoding and writing a snapshot is file I/O, so the loop only hands each batch
//! to a bounded channel. A [`FrameRecorder`] drains it on a blocking thread and keeps the
//! [`FrameLog`] to itself. When every sender is dropped the recorder finishes the jobs still
//! queued and hands the log back.

use crate::{OrchestratorError, Result};
use frame_log::{FrameLog, FrameRecord};
use std::time::Instant;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vision_detect::{annotate, io as image_io, Detection, Frame};

/// A detection batch waiting to be annotated and written.
#[derive(Clone, Debug)]
pub struct FrameJob {
    pub frame: Frame,
    pub detections: Vec<Detection>,
    pub captured_at: OffsetDateTime,
    pub monotonic: Instant,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub logged: u64,
    pub failed: u64,
}

pub struct FrameRecorder {
    log: FrameLog,
    extension: String,
    stats: RecorderStats,
}

impl FrameRecorder {
    pub fn new(log: FrameLog, extension: &str) -> Self {
        Self {
            log,
            extension: extension.trim_start_matches('.').to_string(),
            stats: RecorderStats::default(),
        }
    }

    /// Annotate, encode and record one batch.
    pub fn write(&mut self, job: FrameJob) -> Result<()> {
        let annotated = annotate::annotate(&job.frame, &job.detections);
        let image =
            image_io::encode(&annotated, &self.extension).map_err(OrchestratorError::FrameEncode)?;
        let entry = self.log.record(FrameRecord {
            captured_at: job.captured_at,
            monotonic: job.monotonic,
            image,
            detections: job.detections,
        })?;
        debug!(stem = %entry.stem, "batch snapshot written");
        Ok(())
    }

    fn write_counted(&mut self, job: FrameJob) {
        match self.write(job) {
            Ok(()) => self.stats.logged += 1,
            Err(e) => {
                warn!(error = %e, "failed to record frame");
                self.stats.failed += 1;
            }
        }
    }

    /// Drain `jobs` on a blocking thread until all senders are gone.
    pub fn spawn(mut self, mut jobs: mpsc::Receiver<FrameJob>) -> JoinHandle<FrameRecorder> {
        tokio::task::spawn_blocking(move || {
            info!(dir = %self.log.dir().display(), "frame recorder started");
            while let Some(job) = jobs.blocking_recv() {
                self.write_counted(job);
            }
            info!(
                logged = self.stats.logged,
                failed = self.stats.failed,
                retained = self.log.len(),
                "frame recorder stopped"
            );
            self
        })
    }

    pub fn stats(&self) -> RecorderStats {
        self.stats
    }

    pub fn log(&self) -> &FrameLog {
        &self.log
    }

    pub fn into_log(self) -> FrameLog {
        self.log
    }
}
