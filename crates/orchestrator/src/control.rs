//! The orchestrator state machine
//!
//! Every input (wake events, detection batches, subsystem faults) is handled by a method that
//! runs to completion without blocking. Speech is driven separately by
//! [`Orchestrator::service_speech`], which the loop calls after every item:
//!
//! ```text
//!   Idle --dispatch--> Speaking --completed--> Idle
//!                      Speaking --hazard queued / stop--> Idle
//! ```

use crate::config::{BuddyConfig, DetectionConfig, WakeConfig};
use crate::risk::{coalesce, HazardClassifier};
use crate::{Announcement, AnnouncementQueue, FrameJob, Mode, Priority, SubsystemFault};
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use vision_detect::{Detection, Frame};
use voice_local::{SpeechEngine, SpeechHandle, WakeEvent, WakeEventKind};

/// One detection pass: the frame it ran on and what the model found.
#[derive(Clone, Debug)]
pub struct DetectionBatch {
    pub frame: Frame,
    pub detections: Vec<Detection>,
    pub captured_at: OffsetDateTime,
    pub monotonic: Instant,
}

impl DetectionBatch {
    pub fn new(frame: Frame, detections: Vec<Detection>) -> Self {
        Self {
            captured_at: frame.ts.unwrap_or_else(OffsetDateTime::now_utc),
            frame,
            detections,
            monotonic: Instant::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackState {
    Idle,
    Speaking {
        handle: SpeechHandle,
        announcement: Announcement,
    },
}

impl PlaybackState {
    pub fn is_idle(&self) -> bool {
        matches!(self, PlaybackState::Idle)
    }

    pub fn priority(&self) -> Option<Priority> {
        match self {
            PlaybackState::Idle => None,
            PlaybackState::Speaking { announcement, .. } => Some(announcement.priority),
        }
    }
}

/// Counters for the lifetime of one orchestrator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    pub wake_events: u64,
    pub batches: u64,
    /// Filled in from the frame recorder once it has stopped
    pub frames_logged: u64,
    pub frame_log_errors: u64,
    /// Batches the recorder had no room for
    pub frames_dropped: u64,
    pub enqueued: u64,
    pub suppressed: u64,
    pub overflowed: u64,
    pub dispatched: u64,
    pub completed: u64,
    pub preempted: u64,
    pub stopped: u64,
    pub dispatch_failures: u64,
    pub faults: u64,
}

/// The most recent batch, kept for scan requests.
struct Scene {
    detections: Vec<Detection>,
    at: Instant,
}

struct LastDetection {
    labels: Vec<String>,
    priority: Priority,
    at: Instant,
}

/// Sole owner of the mode, the announcement queue and the playback state.
pub struct Orchestrator<S: SpeechEngine> {
    mode: Mode,
    queue: AnnouncementQueue,
    playback: PlaybackState,
    speech: S,
    frames: mpsc::Sender<FrameJob>,
    hazards: HazardClassifier,
    detection: DetectionConfig,
    wake: WakeConfig,
    scene: Option<Scene>,
    scene_ttl: Duration,
    listening_until: Option<Instant>,
    last_detection: Option<LastDetection>,
    shutdown_requested: bool,
    stats: OrchestratorStats,
}

impl<S: SpeechEngine> Orchestrator<S> {
    /// `frames` feeds the frame recorder; every batch is offered to it.
    pub fn new(config: &BuddyConfig, speech: S, frames: mpsc::Sender<FrameJob>) -> Self {
        Self {
            mode: config.initial_mode,
            queue: AnnouncementQueue::new(config.queue.normal_capacity),
            playback: PlaybackState::Idle,
            speech,
            frames,
            hazards: HazardClassifier::new(&config.detection.hazard_labels),
            detection: config.detection.clone(),
            wake: config.wake.clone(),
            scene: None,
            scene_ttl: config.runtime.scene_ttl(),
            listening_until: None,
            last_detection: None,
            shutdown_requested: false,
            stats: OrchestratorStats::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Explicit control input, e.g. the initial mode from the command line. Not confirmed aloud.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            info!(from = %self.mode, to = %mode, "mode set");
            self.mode = mode;
            self.last_detection = None;
        }
    }

    pub fn queue(&self) -> &AnnouncementQueue {
        &self.queue
    }

    pub fn playback(&self) -> &PlaybackState {
        &self.playback
    }

    pub fn speech(&self) -> &S {
        &self.speech
    }

    pub fn stats(&self) -> &OrchestratorStats {
        &self.stats
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    pub fn is_listening(&self, now: Instant) -> bool {
        self.listening_until.is_some_and(|until| now <= until)
    }

    pub fn on_wake_event(&mut self, event: WakeEvent) {
        self.on_wake_event_at(event, Instant::now());
    }

    /// Handle a wake event as if it arrived at `now`.
    pub fn on_wake_event_at(&mut self, event: WakeEvent, now: Instant) {
        self.stats.wake_events += 1;
        match event.kind {
            WakeEventKind::WakePhrase => {
                self.listening_until = Some(now + self.wake.window());
                info!(window_ms = self.wake.window_ms, "wake phrase heard");
                if !self.wake.acknowledgement.trim().is_empty() {
                    self.enqueue(Announcement::normal(self.wake.acknowledgement.clone()));
                }
            }
            WakeEventKind::StopCommand => self.stop_normal(),
            WakeEventKind::ModeSwitchCommand
            | WakeEventKind::ScanCommand
            | WakeEventKind::ShutdownCommand => {
                if self.wake.require_wake_phrase && !self.is_listening(now) {
                    debug!(kind = ?event.kind, "command outside listening window ignored");
                    return;
                }
                self.listening_until = None;
                match event.kind {
                    WakeEventKind::ModeSwitchCommand => self.switch_mode(event.payload.as_deref()),
                    WakeEventKind::ScanCommand => self.scan(now),
                    _ => {
                        info!("shutdown requested by voice command");
                        self.shutdown_requested = true;
                    }
                }
            }
            WakeEventKind::Unknown => {
                debug!(payload = ?event.payload, "unrecognised wake event ignored");
            }
        }
    }

    fn switch_mode(&mut self, target: Option<&str>) {
        let next = target
            .and_then(|t| t.parse::<Mode>().ok())
            .unwrap_or_else(|| self.mode.toggled());
        info!(from = %self.mode, to = %next, "mode switched");
        self.mode = next;
        // Cooldown applies per mode; a fresh mode starts with a clean slate
        self.last_detection = None;
        self.enqueue(Announcement::normal(next.confirmation()));
    }

    fn stop_normal(&mut self) {
        if let PlaybackState::Speaking {
            handle,
            announcement,
        } = &self.playback
        {
            if announcement.priority == Priority::Normal {
                info!(text = %announcement.text, "normal playback stopped by command");
                self.speech.stop(*handle);
                self.playback = PlaybackState::Idle;
                self.stats.stopped += 1;
            }
        }
        let cleared = self.queue.clear_normal();
        if cleared > 0 {
            debug!(cleared, "queued normal announcements cleared");
        }
    }

    /// Describe the latest batch, unless it is too old to say anything about the present.
    fn scan(&mut self, now: Instant) {
        let current = self
            .scene
            .as_ref()
            .filter(|scene| now.saturating_duration_since(scene.at) <= self.scene_ttl);
        if current.is_none() {
            debug!("no current scene for scan");
        }
        let found = current.and_then(|scene| {
            coalesce(
                &scene.detections,
                self.mode,
                self.detection.confidence_threshold,
                self.detection.max_labels_per_announcement,
            )
        });
        let text = match (found, self.mode) {
            (Some(c), _) => format!("Nearby: {}", c.labels.join(", ")),
            (None, Mode::Normal) => "Nothing detected nearby".to_string(),
            (None, Mode::Hazard) => "No hazards detected".to_string(),
        };
        self.enqueue(Announcement::normal(text));
    }

    /// Hand the batch to the frame recorder, then enqueue at most one coalesced announcement for it.
    ///
    /// The mode is sampled once at the start, so a switch handled later cannot change how
    /// this batch is filtered. Returns the announcement that was enqueued.
    pub fn on_detection_batch(&mut self, batch: DetectionBatch) -> Option<Announcement> {
        let mode = self.mode;
        self.stats.batches += 1;
        let DetectionBatch {
            frame,
            mut detections,
            captured_at,
            monotonic,
        } = batch;
        self.hazards.normalize(&mut detections);
        self.scene = Some(Scene {
            detections: detections.clone(),
            at: monotonic,
        });
        self.log_frame(FrameJob {
            frame,
            detections: detections.clone(),
            captured_at,
            monotonic,
        });

        let coalesced = coalesce(
            &detections,
            mode,
            self.detection.confidence_threshold,
            self.detection.max_labels_per_announcement,
        )?;

        if self.is_repeat(&coalesced.labels, coalesced.priority, monotonic) {
            debug!(labels = ?coalesced.labels, "repeat announcement suppressed");
            self.stats.suppressed += 1;
            return None;
        }

        let announcement = Announcement::new(coalesced.text(), coalesced.priority)
            .with_labels(coalesced.labels.clone())
            .created_at(monotonic);
        self.last_detection = Some(LastDetection {
            labels: coalesced.labels,
            priority: coalesced.priority,
            at: monotonic,
        });
        self.enqueue(announcement.clone());
        Some(announcement)
    }

    fn log_frame(&mut self, job: FrameJob) {
        match self.frames.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("frame recorder behind; batch not logged");
                self.stats.frames_dropped += 1;
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("frame recorder stopped; batch not logged");
                self.stats.frames_dropped += 1;
            }
        }
    }

    fn is_repeat(&self, labels: &[String], priority: Priority, now: Instant) -> bool {
        let cooldown = self.detection.repeat_cooldown();
        if cooldown.is_zero() {
            return false;
        }
        let Some(last) = &self.last_detection else {
            return false;
        };
        if priority > last.priority || now.saturating_duration_since(last.at) >= cooldown {
            return false;
        }
        let mut a = labels.to_vec();
        let mut b = last.labels.clone();
        a.sort();
        b.sort();
        a == b
    }

    pub fn on_subsystem_fault(&mut self, fault: SubsystemFault) {
        self.stats.faults += 1;
        warn!(
            subsystem = %fault.subsystem,
            failures = fault.consecutive_failures,
            error = %fault.last_error,
            "announcing subsystem fault"
        );
        self.enqueue(Announcement::normal(fault.subsystem.fault_message()));
    }

    /// Queue a free-form announcement, e.g. a lifecycle message.
    pub fn announce(&mut self, announcement: Announcement) {
        self.enqueue(announcement);
    }

    fn enqueue(&mut self, announcement: Announcement) {
        debug!(text = %announcement.text, priority = ?announcement.priority, "announcement queued");
        self.stats.enqueued += 1;
        if self.queue.push(announcement).is_some() {
            self.stats.overflowed += 1;
        }
    }

    /// Advance playback: notice completion, preempt Normal speech for a queued hazard, and
    /// dispatch the next announcement when idle.
    pub fn service_speech(&mut self) {
        if let PlaybackState::Speaking { announcement, .. } = &self.playback {
            if self.speech.is_idle() {
                debug!(text = %announcement.text, "announcement finished");
                self.playback = PlaybackState::Idle;
                self.stats.completed += 1;
            }
        }

        if let PlaybackState::Speaking {
            handle,
            announcement,
        } = &self.playback
        {
            if announcement.priority == Priority::Hazard || !self.queue.has_hazard() {
                return;
            }
            info!(text = %announcement.text, "normal announcement preempted by hazard");
            self.speech.stop(*handle);
            self.playback = PlaybackState::Idle;
            self.stats.preempted += 1;
        }

        let Some(next) = self.queue.pop() else {
            return;
        };
        match self.speech.speak(&next.text) {
            Ok(handle) => {
                info!(text = %next.text, priority = ?next.priority, "speaking");
                self.stats.dispatched += 1;
                self.playback = PlaybackState::Speaking {
                    handle,
                    announcement: next,
                };
            }
            Err(e) => {
                warn!(text = %next.text, error = %e, "speech dispatch failed; announcement dropped");
                self.stats.dispatch_failures += 1;
            }
        }
    }

    /// True once nothing is playing and nothing is queued.
    pub fn is_quiet(&self) -> bool {
        self.playback.is_idle() && self.queue.is_empty()
    }

    /// Cut everything short and start the farewell message.
    pub fn begin_shutdown(&mut self, message: &str) {
        self.shutdown_requested = true;
        if let PlaybackState::Speaking { handle, .. } = &self.playback {
            self.speech.stop(*handle);
            self.playback = PlaybackState::Idle;
        }
        let dropped = self.queue.len();
        while self.queue.pop().is_some() {}
        if dropped > 0 {
            debug!(dropped, "pending announcements dropped at shutdown");
        }
        if !message.trim().is_empty() {
            self.enqueue(Announcement::normal(message));
            self.service_speech();
        }
    }

    /// Closes this side of the recorder channel.
    pub fn into_parts(self) -> (S, OrchestratorStats) {
        (self.speech, self.stats)
    }
}
