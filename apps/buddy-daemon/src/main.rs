use anyhow::{Context, Result};
use clap::Parser;
use frame_log::FrameLog;
use orchestrator::config::{CameraBackend, CameraConfig, SpeechBackend, WakeBackend};
use orchestrator::{run, Adapters, BuddyConfig, Mode};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use vision_detect::{
    BoundingBox, CameraSource, Detection, DetectionModel, MockCamera, ScriptedDetector,
};
use voice_local::plugin::{new_speech_backend, new_wake_backend, SpeechBackendKind, WakeBackendKind};
use voice_local::{AsrStreamConfig, TtsConfig};

/// How long to wait for adapter threads still stuck in a call after the loop has exited
const RUNTIME_SHUTDOWN: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "buddy-daemon")]
#[command(about = "Offline assistive device: wake word, object detection and speech")]
struct Args {
    /// YAML config file; built-in defaults are used when absent
    #[arg(long)]
    config: Option<PathBuf>,

    /// Camera device index or path
    #[arg(long)]
    camera: Option<String>,

    /// Camera backend (mock, opencv)
    #[arg(long)]
    camera_backend: Option<CameraBackend>,

    /// Wake engine backend (mock, console, transcript)
    #[arg(long)]
    wake_backend: Option<WakeBackend>,

    /// Speech backend (mock, espeak, piper)
    #[arg(long)]
    speech_backend: Option<SpeechBackend>,

    /// Directory for the detection snapshot log
    #[arg(long)]
    frame_log_dir: Option<PathBuf>,

    /// Initial mode (normal, hazard)
    #[arg(long)]
    mode: Option<Mode>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_tracing(&args.log_level);

    let config = effective_config(&args)?;
    if args.print_config {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    info!("Buddy Core daemon starting");
    info!(
        camera = %config.camera.backend,
        wake = %config.wake.backend,
        speech = %config.speech.backend,
        mode = %config.initial_mode,
        "backends selected"
    );

    // Adapter initialisation failures are the only fatal errors; surface them before the loop
    let frame_log = FrameLog::open(
        &config.frame_log.dir,
        config.frame_log.capacity,
        &config.frame_log.image_extension,
    )
    .with_context(|| format!("opening frame log {}", config.frame_log.dir.display()))?;
    let camera = open_camera(&config.camera)?;
    let model = open_detector(&config);
    let wake = new_wake_backend(wake_kind(config.wake.backend), asr_config(&config))
        .map_err(|e| anyhow::anyhow!("Failed to initialise wake engine: {}", e))?;
    let speech = new_speech_backend(speech_kind(config.speech.backend), &tts_config(&config))
        .map_err(|e| anyhow::anyhow!("Failed to initialise speech engine: {}", e))?;

    #[cfg(feature = "audio")]
    let _mic = wake.mic;
    let adapters = Adapters {
        camera,
        model,
        wake: wake.engine,
        speech,
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    let outcome = runtime.block_on(run(&config, adapters, frame_log, interrupted()));
    // Blocking adapter calls that timed out may still be running; do not wait on them forever
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN);

    match outcome {
        Ok(stats) => {
            info!(
                batches = stats.batches,
                dispatched = stats.dispatched,
                preempted = stats.preempted,
                faults = stats.faults,
                "Buddy Core daemon stopped"
            );
            Ok(())
        }
        Err(e) => {
            error!("Buddy Core loop failed: {}", e);
            Err(e.into())
        }
    }
}

fn effective_config(args: &Args) -> Result<BuddyConfig> {
    let mut config = match &args.config {
        Some(path) => BuddyConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => BuddyConfig::default(),
    };
    if let Some(device) = &args.camera {
        config.camera.device = device.clone();
    }
    if let Some(backend) = args.camera_backend {
        config.camera.backend = backend;
    }
    if let Some(backend) = args.wake_backend {
        config.wake.backend = backend;
    }
    if let Some(backend) = args.speech_backend {
        config.speech.backend = backend;
    }
    if let Some(dir) = &args.frame_log_dir {
        config.frame_log.dir = dir.clone();
    }
    if let Some(mode) = args.mode {
        config.initial_mode = mode;
    }
    config.validate()?;
    Ok(config)
}

fn open_camera(cfg: &CameraConfig) -> Result<Box<dyn CameraSource + Send>> {
    match cfg.backend {
        CameraBackend::Mock => Ok(Box::new(MockCamera::open(&cfg.device)?)),
        CameraBackend::Opencv => {
            #[cfg(feature = "opencv")]
            {
                let camera = vision_detect::OpenCvCamera::open(&cfg.device)
                    .with_context(|| format!("opening camera {}", cfg.device))?;
                Ok(Box::new(camera))
            }
            #[cfg(not(feature = "opencv"))]
            {
                anyhow::bail!("opencv camera backend needs the `opencv` feature")
            }
        }
    }
}

/// No inference runtime is linked into the daemon yet, so detection is driven by a looping
/// demo script that exercises both modes.
fn open_detector(config: &BuddyConfig) -> Box<dyn DetectionModel + Send> {
    warn!(
        model = %config.detection.model_path.display(),
        "no inference backend compiled in; using scripted demo detections"
    );
    let det = |label: &str, confidence: f32, x: f32| {
        Detection::new(label, confidence, BoundingBox::new(x, 40.0, 80.0, 120.0))
    };
    Box::new(ScriptedDetector::looping(vec![
        vec![],
        vec![det("chair", 0.91, 20.0), det("cup", 0.82, 140.0)],
        vec![],
        vec![],
        vec![det("person", 0.88, 60.0), det("cup", 0.7, 200.0)],
        vec![],
        vec![det("book", 0.42, 100.0)],
        vec![],
    ]))
}

fn wake_kind(backend: WakeBackend) -> WakeBackendKind {
    match backend {
        WakeBackend::Mock => WakeBackendKind::Mock,
        WakeBackend::Console => WakeBackendKind::Console,
        WakeBackend::Transcript => WakeBackendKind::Transcript,
    }
}

fn speech_kind(backend: SpeechBackend) -> SpeechBackendKind {
    match backend {
        SpeechBackend::Mock => SpeechBackendKind::Mock,
        SpeechBackend::Espeak => SpeechBackendKind::Espeak,
        SpeechBackend::Piper => SpeechBackendKind::Piper,
    }
}

fn asr_config(config: &BuddyConfig) -> AsrStreamConfig {
    AsrStreamConfig {
        language: Some("en".to_string()),
        sample_rate_hz: 16_000,
        wake_words: config.wake.phrases.clone(),
    }
}

fn tts_config(config: &BuddyConfig) -> TtsConfig {
    TtsConfig {
        voice: Some(config.speech.voice.clone()),
        model_path: Some(config.speech.piper_model.clone()),
    }
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C ({}); relying on the voice shutdown command", e);
        std::future::pending::<()>().await;
    }
}

fn setup_tracing(fallback: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
