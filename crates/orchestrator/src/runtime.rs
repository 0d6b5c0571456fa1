//! The async main loop

use crate::pipeline::{VisionPipeline, WakePipeline};
use crate::{Announcement, BuddyConfig, FrameRecorder, Orchestrator, OrchestratorStats, Result};
use frame_log::FrameLog;
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};
use vision_detect::{CameraSource, DetectionModel};
use voice_local::{SpeechEngine, WakeWordEngine};

const WAKE_QUEUE: usize = 16;
const DETECTION_QUEUE: usize = 4;
const NOTICE_QUEUE: usize = 8;
const FRAME_QUEUE: usize = 8;
const PIPELINE_JOIN: Duration = Duration::from_secs(1);
const RECORDER_JOIN: Duration = Duration::from_secs(5);

/// The four leaf adapters, already opened.
pub struct Adapters {
    pub camera: Box<dyn CameraSource + Send>,
    pub model: Box<dyn DetectionModel + Send>,
    pub wake: Box<dyn WakeWordEngine + Send>,
    pub speech: Box<dyn SpeechEngine + Send>,
}

/// Run the device until a shutdown command is heard or `shutdown` resolves.
///
/// Wake events are serviced before detection batches, and both before subsystem notices.
/// After every item (and on every tick) the speech state machine is advanced.
pub async fn run<F>(
    config: &BuddyConfig,
    adapters: Adapters,
    frame_log: FrameLog,
    shutdown: F,
) -> Result<OrchestratorStats>
where
    F: Future<Output = ()>,
{
    config.validate()?;
    let Adapters {
        camera,
        model,
        wake,
        speech,
    } = adapters;

    let (wake_tx, mut wake_rx) = mpsc::channel(WAKE_QUEUE);
    let (batch_tx, mut batch_rx) = mpsc::channel(DETECTION_QUEUE);
    let (notice_tx, mut notice_rx) = mpsc::channel(NOTICE_QUEUE);
    let (frame_tx, frame_rx) = mpsc::channel(FRAME_QUEUE);
    let (stop_tx, stop_rx) = watch::channel(false);

    let vision = VisionPipeline::new(camera, model, &config.runtime);
    let listener = WakePipeline::new(wake, &config.runtime);
    let vision_task = tokio::spawn(vision.run(batch_tx, notice_tx.clone(), stop_rx.clone()));
    let wake_task = tokio::spawn(listener.run(wake_tx, notice_tx, stop_rx));

    let log_dir = frame_log.dir().to_path_buf();
    let recorder_task =
        FrameRecorder::new(frame_log, &config.frame_log.image_extension).spawn(frame_rx);

    let mut orch = Orchestrator::new(config, speech, frame_tx);
    info!(
        mode = %orch.mode(),
        frame_log = %log_dir.display(),
        "buddy core running"
    );
    if !config.speech.startup_message.trim().is_empty() {
        orch.announce(Announcement::normal(config.speech.startup_message.clone()));
    }
    orch.service_speech();

    let mut tick = tokio::time::interval(config.runtime.tick());
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("shutdown signal received");
                break;
            }
            Some(event) = wake_rx.recv() => orch.on_wake_event(event),
            Some(batch) = batch_rx.recv() => {
                orch.on_detection_batch(batch);
            }
            Some(fault) = notice_rx.recv() => orch.on_subsystem_fault(fault),
            _ = tick.tick() => {}
        }
        orch.service_speech();
        if orch.shutdown_requested() {
            break;
        }
    }

    // Pipelines first, so nothing new arrives while the farewell plays
    let _ = stop_tx.send(true);
    orch.begin_shutdown(&config.speech.shutdown_message);
    let deadline = Instant::now() + config.speech.shutdown_grace();
    while !orch.is_quiet() && Instant::now() < deadline {
        tick.tick().await;
        orch.service_speech();
    }
    if !orch.is_quiet() {
        warn!("shutdown grace elapsed before speech finished");
    }

    for (name, task) in [("vision", vision_task), ("wake", wake_task)] {
        match tokio::time::timeout(PIPELINE_JOIN, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(pipeline = name, error = %e, "pipeline task failed"),
            Err(_) => warn!(pipeline = name, "pipeline still blocked in an adapter call"),
        }
    }

    // Dropping the orchestrator closes the recorder channel; the recorder finishes its backlog
    let (_speech, mut stats) = orch.into_parts();
    match tokio::time::timeout(RECORDER_JOIN, recorder_task).await {
        Ok(Ok(recorder)) => {
            let written = recorder.stats();
            stats.frames_logged = written.logged;
            stats.frame_log_errors = written.failed;
        }
        Ok(Err(e)) => warn!(error = %e, "frame recorder task failed"),
        Err(_) => warn!("frame recorder still writing at shutdown"),
    }
    info!(
        batches = stats.batches,
        dispatched = stats.dispatched,
        frames_logged = stats.frames_logged,
        "buddy core stopped"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Mode;
    use tempfile::TempDir;
    use vision_detect::{BoundingBox, Detection, MockCamera, ScriptedDetector};
    use voice_local::{MockSpeech, MockStep, MockWakeEngine, WakeEvent};

    fn fast_config() -> BuddyConfig {
        let mut cfg = BuddyConfig::default();
        cfg.runtime.camera_timeout_ms = 200;
        cfg.runtime.detect_timeout_ms = 200;
        cfg.runtime.wake_poll_ms = 10;
        cfg.runtime.tick_ms = 5;
        cfg.runtime.capture_interval_ms = 5;
        cfg.wake.acknowledgement = String::new();
        cfg
    }

    fn adapters(steps: Vec<MockStep>, speech: MockSpeech) -> Adapters {
        let knife = Detection::new("knife", 0.9, BoundingBox::new(2.0, 2.0, 20.0, 20.0));
        Adapters {
            camera: Box::new(MockCamera::open("0").unwrap()),
            model: Box::new(ScriptedDetector::looping(vec![vec![knife]])),
            wake: Box::new(MockWakeEngine::new(steps)),
            speech: Box::new(speech),
        }
    }

    #[tokio::test]
    async fn test_voice_shutdown_ends_loop() {
        let dir = TempDir::new().unwrap();
        let cfg = fast_config();
        let log = FrameLog::open(dir.path(), 10, "ppm").unwrap();
        let speech = MockSpeech::timed(Duration::from_millis(1));
        let probe = speech.probe();
        let mut steps = vec![MockStep::Silence; 10];
        steps.push(MockStep::Event(WakeEvent::wake_phrase()));
        steps.push(MockStep::Event(WakeEvent::shutdown()));

        let stats = tokio::time::timeout(
            Duration::from_secs(5),
            run(&cfg, adapters(steps, speech), log, std::future::pending()),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(stats.batches > 0);
        assert_eq!(stats.frames_logged + stats.frames_dropped, stats.batches);
        let spoken = probe.spoken();
        assert_eq!(spoken.first().map(String::as_str), Some("Buddy Core started"));
        assert_eq!(spoken.last().map(String::as_str), Some("Buddy Core shutting down"));
        let reopened = FrameLog::open(dir.path(), 10, "ppm").unwrap();
        assert!(!reopened.is_empty());
        assert_eq!(reopened.latest().unwrap().detections[0].label, "knife");
    }

    #[tokio::test]
    async fn test_external_shutdown_future() {
        let dir = TempDir::new().unwrap();
        let mut cfg = fast_config();
        cfg.initial_mode = Mode::Hazard;
        let log = FrameLog::open(dir.path(), 10, "ppm").unwrap();
        let speech = MockSpeech::timed(Duration::from_millis(1));
        let probe = speech.probe();

        let stats = tokio::time::timeout(
            Duration::from_secs(5),
            run(
                &cfg,
                adapters(vec![], speech),
                log,
                tokio::time::sleep(Duration::from_millis(150)),
            ),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(stats.dispatched >= 2);
        assert!(probe.spoken().iter().any(|s| s == "Caution: knife"));
        assert_eq!(
            probe.spoken().last().map(String::as_str),
            Some("Buddy Core shutting down")
        );
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_start() {
        let dir = TempDir::new().unwrap();
        let mut cfg = fast_config();
        cfg.detection.confidence_threshold = 2.0;
        let log = FrameLog::open(dir.path(), 10, "ppm").unwrap();
        let res = run(&cfg, adapters(vec![], MockSpeech::new()), log, std::future::pending()).await;
        assert!(matches!(res, Err(crate::OrchestratorError::Config(_))));
    }
}
