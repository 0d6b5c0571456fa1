//! Capture pipelines
//!
//! Each pipeline is a producer-only task feeding one bounded channel. Adapters sit behind a
//! mutex taken with `try_lock` inside [`bounded_call`], so an adapter still stuck in a
//! timed-out call is reported busy instead of stacking up blocking threads.

use crate::config::RuntimeConfig;
use crate::{
    bounded_call, DetectionBatch, OrchestratorError, Result, Subsystem, SubsystemFault,
    SubsystemWatchdog,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use vision_detect::{CameraSource, Detection, DetectionModel, Frame, ModelError};
use voice_local::{EngineError, WakeEvent, WakeWordEngine};

pub type SharedCamera = Arc<Mutex<Box<dyn CameraSource + Send>>>;
pub type SharedModel = Arc<Mutex<Box<dyn DetectionModel + Send>>>;
pub type SharedWakeEngine = Arc<Mutex<Box<dyn WakeWordEngine + Send>>>;

/// Extra time a wake poll may take beyond its own timeout before it counts as stalled.
const WAKE_GRACE: Duration = Duration::from_millis(250);

fn report(
    watchdog: &mut SubsystemWatchdog,
    notices: &mpsc::Sender<SubsystemFault>,
    error: &OrchestratorError,
) {
    debug!(error = %error, "adapter call failed; cycle skipped");
    if let Some(fault) = watchdog.record_failure(error) {
        if notices.try_send(fault).is_err() {
            debug!("notice channel full; fault notice dropped");
        }
    }
}

/// Camera capture followed by detection, once per capture interval.
pub struct VisionPipeline {
    camera: SharedCamera,
    model: SharedModel,
    camera_timeout: Duration,
    detect_timeout: Duration,
    interval: Duration,
    fault_threshold: u32,
}

impl VisionPipeline {
    pub fn new(
        camera: Box<dyn CameraSource + Send>,
        model: Box<dyn DetectionModel + Send>,
        runtime: &RuntimeConfig,
    ) -> Self {
        Self {
            camera: Arc::new(Mutex::new(camera)),
            model: Arc::new(Mutex::new(model)),
            camera_timeout: runtime.camera_timeout(),
            detect_timeout: runtime.detect_timeout(),
            interval: runtime.capture_interval(),
            fault_threshold: runtime.fault_threshold,
        }
    }

    async fn capture(&self) -> Result<Frame> {
        let camera = Arc::clone(&self.camera);
        bounded_call("camera", self.camera_timeout, move || {
            let mut camera = camera.try_lock().ok_or_else(|| {
                vision_detect::Error::Backend("camera busy with a stalled read".into())
            })?;
            Ok(camera.read()?)
        })
        .await
    }

    async fn detect(&self, frame: Frame) -> Result<(Frame, Vec<Detection>)> {
        let model = Arc::clone(&self.model);
        bounded_call("detector", self.detect_timeout, move || {
            let mut model = model.try_lock().ok_or(ModelError::Busy)?;
            let detections = model.detect(&frame)?;
            Ok((frame, detections))
        })
        .await
    }

    /// Run until `stop` turns true or the batch receiver goes away.
    pub async fn run(
        self,
        batches: mpsc::Sender<DetectionBatch>,
        notices: mpsc::Sender<SubsystemFault>,
        mut stop: watch::Receiver<bool>,
    ) {
        let mut camera_wd = SubsystemWatchdog::new(Subsystem::Camera, self.fault_threshold);
        let mut detector_wd = SubsystemWatchdog::new(Subsystem::Detector, self.fault_threshold);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_ms = self.interval.as_millis() as u64, "vision pipeline started");

        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => {}
            }
            if *stop.borrow() {
                break;
            }

            let monotonic = Instant::now();
            let frame = match self.capture().await {
                Ok(frame) => {
                    camera_wd.record_success();
                    frame
                }
                Err(e) => {
                    report(&mut camera_wd, &notices, &e);
                    continue;
                }
            };
            let captured_at = frame.ts.unwrap_or_else(OffsetDateTime::now_utc);
            let (frame, detections) = match self.detect(frame).await {
                Ok(out) => {
                    detector_wd.record_success();
                    out
                }
                Err(e) => {
                    report(&mut detector_wd, &notices, &e);
                    continue;
                }
            };

            let batch = DetectionBatch {
                frame,
                detections,
                captured_at,
                monotonic,
            };
            match batches.try_send(batch) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("detection queue full; batch dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }
        }
        info!("vision pipeline stopped");
    }
}

/// Polls the wake engine and forwards its events in arrival order.
///
/// The blocking poll parks what it hears in an inbox instead of returning it, so an event
/// taken by a poll that overran its bound is forwarded on the next pass rather than lost.
pub struct WakePipeline {
    engine: SharedWakeEngine,
    inbox: Arc<Mutex<VecDeque<WakeEvent>>>,
    poll: Duration,
    fault_threshold: u32,
}

impl WakePipeline {
    pub fn new(engine: Box<dyn WakeWordEngine + Send>, runtime: &RuntimeConfig) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            inbox: Arc::new(Mutex::new(VecDeque::new())),
            poll: runtime.wake_poll(),
            fault_threshold: runtime.fault_threshold,
        }
    }

    async fn poll_once(&self) -> Result<()> {
        let engine = Arc::clone(&self.engine);
        let inbox = Arc::clone(&self.inbox);
        let poll = self.poll;
        bounded_call("wake_engine", poll + WAKE_GRACE, move || {
            let mut engine = engine.try_lock().ok_or(EngineError::Busy)?;
            if let Some(event) = engine.next_event(poll)? {
                inbox.lock().push_back(event);
            }
            Ok(())
        })
        .await
    }

    fn take_event(&self) -> Option<WakeEvent> {
        self.inbox.lock().pop_front()
    }

    pub async fn run(
        self,
        events: mpsc::Sender<WakeEvent>,
        notices: mpsc::Sender<SubsystemFault>,
        mut stop: watch::Receiver<bool>,
    ) {
        let mut watchdog = SubsystemWatchdog::new(Subsystem::WakeEngine, self.fault_threshold);
        info!(poll_ms = self.poll.as_millis() as u64, "wake pipeline started");

        'outer: loop {
            if *stop.borrow() {
                break;
            }
            while let Some(event) = self.take_event() {
                debug!(kind = ?event.kind, "wake event");
                tokio::select! {
                    _ = stop.changed() => break 'outer,
                    sent = events.send(event) => if sent.is_err() { break 'outer },
                }
            }
            let result = tokio::select! {
                _ = stop.changed() => break,
                r = self.poll_once() => r,
            };
            match result {
                Ok(()) => {
                    watchdog.record_success();
                }
                Err(e) => {
                    report(&mut watchdog, &notices, &e);
                    // Back off so a dead device does not spin
                    tokio::select! {
                        _ = stop.changed() => break,
                        _ = tokio::time::sleep(self.poll) => {}
                    }
                }
            }
        }
        info!("wake pipeline stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vision_detect::{BoundingBox, MockCamera, ScriptedDetector};
    use voice_local::{MockStep, MockWakeEngine, WakeEventKind};

    fn fast_runtime() -> RuntimeConfig {
        RuntimeConfig {
            camera_timeout_ms: 50,
            detect_timeout_ms: 50,
            wake_poll_ms: 10,
            tick_ms: 5,
            capture_interval_ms: 5,
            fault_threshold: 3,
        }
    }

    struct StalledCamera;

    impl CameraSource for StalledCamera {
        fn open(_spec: &str) -> vision_detect::Result<Self> {
            Ok(Self)
        }

        fn read(&mut self) -> vision_detect::Result<Frame> {
            std::thread::sleep(Duration::from_millis(400));
            Err(vision_detect::Error::Io("read timed out".into()))
        }
    }

    struct BrokenModel;

    impl DetectionModel for BrokenModel {
        fn detect(&mut self, _frame: &Frame) -> core::result::Result<Vec<Detection>, ModelError> {
            Err(ModelError::Inference("tensor shape mismatch".into()))
        }
    }

    #[tokio::test]
    async fn test_vision_pipeline_emits_batches_and_stops() {
        let cam = MockCamera::open("0").unwrap();
        let model = ScriptedDetector::looping(vec![vec![Detection::new(
            "cup",
            0.9,
            BoundingBox::new(0.0, 0.0, 5.0, 5.0),
        )]]);
        let pipeline = VisionPipeline::new(Box::new(cam), Box::new(model), &fast_runtime());
        let (batch_tx, mut batch_rx) = mpsc::channel(4);
        let (notice_tx, _notice_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(pipeline.run(batch_tx, notice_tx, stop_rx));

        let batch = tokio::time::timeout(Duration::from_secs(2), batch_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.detections[0].label, "cup");
        assert!(batch.frame.is_well_formed());

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_stalled_camera_raises_one_fault() {
        let model = ScriptedDetector::new(vec![]);
        let pipeline = VisionPipeline::new(Box::new(StalledCamera), Box::new(model), &fast_runtime());
        let (batch_tx, mut batch_rx) = mpsc::channel(4);
        let (notice_tx, mut notice_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(pipeline.run(batch_tx, notice_tx, stop_rx));

        let fault = tokio::time::timeout(Duration::from_secs(2), notice_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fault.subsystem, Subsystem::Camera);
        assert_eq!(fault.consecutive_failures, 3);
        assert!(batch_rx.try_recv().is_err());

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(notice_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_model_errors_skip_cycle() {
        let cam = MockCamera::open("0").unwrap();
        let pipeline = VisionPipeline::new(Box::new(cam), Box::new(BrokenModel), &fast_runtime());
        let (batch_tx, mut batch_rx) = mpsc::channel(4);
        let (notice_tx, mut notice_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(pipeline.run(batch_tx, notice_tx, stop_rx));

        let fault = tokio::time::timeout(Duration::from_secs(2), notice_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fault.subsystem, Subsystem::Detector);
        assert!(batch_rx.try_recv().is_err());
        stop_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_wake_pipeline_forwards_in_order_and_survives_failures() {
        let engine = MockWakeEngine::new(vec![
            MockStep::Event(WakeEvent::wake_phrase()),
            MockStep::Fail("buffer overrun".into()),
            MockStep::Silence,
            MockStep::Event(WakeEvent::mode_switch(Some("hazard"))),
        ]);
        let pipeline = WakePipeline::new(Box::new(engine), &fast_runtime());
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let (notice_tx, _notice_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(pipeline.run(event_tx, notice_tx, stop_rx));

        let mut kinds = Vec::new();
        for _ in 0..2 {
            let ev = tokio::time::timeout(Duration::from_secs(2), event_rx.recv())
                .await
                .unwrap()
                .unwrap();
            kinds.push(ev.kind);
        }
        assert_eq!(
            kinds,
            vec![WakeEventKind::WakePhrase, WakeEventKind::ModeSwitchCommand]
        );
        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }

    /// Hears a stop command, but only after overrunning the poll bound.
    struct SlowStopEngine {
        heard: bool,
    }

    impl WakeWordEngine for SlowStopEngine {
        fn next_event(
            &mut self,
            timeout: Duration,
        ) -> core::result::Result<Option<WakeEvent>, EngineError> {
            if self.heard {
                std::thread::sleep(timeout);
                return Ok(None);
            }
            self.heard = true;
            std::thread::sleep(Duration::from_millis(400));
            Ok(Some(WakeEvent::stop()))
        }
    }

    #[tokio::test]
    async fn test_event_from_overrun_poll_is_delivered() {
        let pipeline = WakePipeline::new(Box::new(SlowStopEngine { heard: false }), &fast_runtime());
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let (notice_tx, _notice_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(pipeline.run(event_tx, notice_tx, stop_rx));

        let ev = tokio::time::timeout(Duration::from_secs(3), event_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ev.kind, WakeEventKind::StopCommand);
        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_stalled_wake_engine_times_out() {
        let engine = MockWakeEngine::new(vec![MockStep::Stall(Duration::from_millis(600))]);
        let mut rt = fast_runtime();
        rt.fault_threshold = 2;
        let pipeline = WakePipeline::new(Box::new(engine), &rt);
        let (event_tx, _event_rx) = mpsc::channel(16);
        let (notice_tx, mut notice_rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(pipeline.run(event_tx, notice_tx, stop_rx));

        let fault = tokio::time::timeout(Duration::from_secs(3), notice_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fault.subsystem, Subsystem::WakeEngine);
        stop_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
