//! Runtime configuration
//!
//! Every section carries serde defaults, so an empty or partial YAML file is valid and the
//! daemon can run with no file at all.

use crate::Mode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuddyConfig {
    /// Mode the device starts in
    pub initial_mode: Mode,
    pub detection: DetectionConfig,
    pub queue: QueueConfig,
    pub frame_log: FrameLogConfig,
    pub wake: WakeConfig,
    pub speech: SpeechConfig,
    pub runtime: RuntimeConfig,
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub confidence_threshold: f32,
    pub hazard_labels: Vec<String>,
    pub max_labels_per_announcement: usize,
    pub repeat_cooldown_ms: u64,
    pub model_path: PathBuf,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            hazard_labels: ["person", "bicycle", "car", "bus", "truck", "knife", "stairs"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_labels_per_announcement: 3,
            repeat_cooldown_ms: 10_000,
            model_path: PathBuf::from("models/yolo11/yolo11n.onnx"),
        }
    }
}

impl DetectionConfig {
    pub fn repeat_cooldown(&self) -> Duration {
        Duration::from_millis(self.repeat_cooldown_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub normal_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { normal_capacity: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameLogConfig {
    pub dir: PathBuf,
    pub capacity: usize,
    pub image_extension: String,
}

impl Default for FrameLogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/detections"),
            capacity: frame_log::DEFAULT_CAPACITY,
            image_extension: "ppm".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    pub backend: WakeBackend,
    pub phrases: Vec<String>,
    pub window_ms: u64,
    /// When false, commands are honoured without a preceding wake phrase
    pub require_wake_phrase: bool,
    /// Spoken after the wake phrase; empty disables it
    pub acknowledgement: String,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            backend: WakeBackend::Console,
            phrases: vec![voice_local::DEFAULT_WAKE_PHRASE.to_string()],
            window_ms: 7_000,
            require_wake_phrase: true,
            acknowledgement: "I'm listening".into(),
        }
    }
}

impl WakeConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub backend: SpeechBackend,
    pub voice: String,
    pub piper_model: PathBuf,
    pub startup_message: String,
    pub shutdown_message: String,
    pub shutdown_grace_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            backend: SpeechBackend::Espeak,
            voice: "en+f1".into(),
            piper_model: PathBuf::from("models/piper_models/en_US-hfc_female-medium.onnx"),
            startup_message: "Buddy Core started".into(),
            shutdown_message: "Buddy Core shutting down".into(),
            shutdown_grace_ms: 3_000,
        }
    }
}

impl SpeechConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub camera_timeout_ms: u64,
    pub detect_timeout_ms: u64,
    pub wake_poll_ms: u64,
    pub tick_ms: u64,
    pub capture_interval_ms: u64,
    pub fault_threshold: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            camera_timeout_ms: 1_000,
            detect_timeout_ms: 2_000,
            wake_poll_ms: 200,
            tick_ms: 50,
            capture_interval_ms: 500,
            fault_threshold: 5,
        }
    }
}

impl RuntimeConfig {
    pub fn camera_timeout(&self) -> Duration {
        Duration::from_millis(self.camera_timeout_ms)
    }

    pub fn detect_timeout(&self) -> Duration {
        Duration::from_millis(self.detect_timeout_ms)
    }

    pub fn wake_poll(&self) -> Duration {
        Duration::from_millis(self.wake_poll_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_millis(self.capture_interval_ms)
    }

    /// How long the last batch describes the surroundings: two capture intervals plus the
    /// time one capture and detection may take.
    pub fn scene_ttl(&self) -> Duration {
        self.capture_interval() * 2 + self.camera_timeout() + self.detect_timeout()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub backend: CameraBackend,
    /// Device index or path handed to `CameraSource::open`
    pub device: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: CameraBackend::Mock,
            device: "0".into(),
        }
    }
}

macro_rules! backend_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $($name::$variant => f.write_str($text)),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!("unknown {} backend: {other}", stringify!($name))),
                }
            }
        }
    };
}

backend_enum!(CameraBackend { Mock => "mock", Opencv => "opencv" });
backend_enum!(WakeBackend { Mock => "mock", Console => "console", Transcript => "transcript" });
backend_enum!(SpeechBackend { Mock => "mock", Espeak => "espeak", Piper => "piper" });

impl BuddyConfig {
    /// Read and validate a YAML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg = Self::from_yaml_str(&raw).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(cfg)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        // An empty document deserialises to unit, not to an empty mapping
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Self = serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.detection.confidence_threshold;
        if !(0.0..=1.0).contains(&t) {
            return Err(ConfigError::Invalid(format!(
                "detection.confidence_threshold {t} outside [0, 1]"
            )));
        }
        if self.detection.max_labels_per_announcement == 0 {
            return Err(ConfigError::Invalid(
                "detection.max_labels_per_announcement must be at least 1".into(),
            ));
        }
        if self.queue.normal_capacity == 0 {
            return Err(ConfigError::Invalid("queue.normal_capacity must be at least 1".into()));
        }
        if self.frame_log.capacity == 0 {
            return Err(ConfigError::Invalid("frame_log.capacity must be at least 1".into()));
        }
        let ext = self.frame_log.image_extension.trim_start_matches('.');
        if !vision_detect::io::supports_extension(ext) {
            return Err(ConfigError::Invalid(format!(
                "frame_log.image_extension {ext:?} cannot be encoded by this build"
            )));
        }
        if self.wake.phrases.iter().all(|p| p.trim().is_empty()) {
            return Err(ConfigError::Invalid("wake.phrases must name at least one phrase".into()));
        }
        if self.runtime.tick_ms == 0 || self.runtime.capture_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "runtime.tick_ms and runtime.capture_interval_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = BuddyConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.frame_log.capacity, 100);
        assert_eq!(cfg.queue.normal_capacity, 5);
        assert_eq!(cfg.wake.window(), Duration::from_secs(7));
        assert!(cfg.detection.hazard_labels.contains(&"knife".to_string()));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = BuddyConfig::from_yaml_str(
            "initial_mode: hazard\ndetection:\n  confidence_threshold: 0.7\nspeech:\n  backend: mock\n",
        )
        .unwrap();
        assert_eq!(cfg.initial_mode, Mode::Hazard);
        assert_eq!(cfg.detection.confidence_threshold, 0.7);
        assert_eq!(cfg.detection.max_labels_per_announcement, 3);
        assert_eq!(cfg.speech.backend, SpeechBackend::Mock);
        assert_eq!(cfg.speech.voice, "en+f1");
    }

    #[test]
    fn test_empty_document_is_default() {
        let cfg = BuddyConfig::from_yaml_str("  \n").unwrap();
        assert_eq!(cfg.runtime.fault_threshold, 5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for yaml in [
            "detection:\n  confidence_threshold: 1.5\n",
            "queue:\n  normal_capacity: 0\n",
            "frame_log:\n  capacity: 0\n",
            "wake:\n  phrases: []\n",
        ] {
            assert!(
                matches!(BuddyConfig::from_yaml_str(yaml), Err(ConfigError::Invalid(_))),
                "{yaml}"
            );
        }
    }

    #[test]
    fn test_image_extension_must_be_encodable() {
        let mut cfg = BuddyConfig::default();
        cfg.frame_log.image_extension = "bmp".into();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        cfg.frame_log.image_extension = "jpg".into();
        assert_eq!(
            cfg.validate().is_ok(),
            vision_detect::io::supports_extension("jpg")
        );

        cfg.frame_log.image_extension = ".ppm".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_unknown_backend_is_parse_error() {
        assert!(matches!(
            BuddyConfig::from_yaml_str("camera:\n  backend: kinect\n"),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("buddy.yaml");
        std::fs::write(&path, "frame_log:\n  dir: /tmp/frames\n").unwrap();
        let cfg = BuddyConfig::load(&path).unwrap();
        assert_eq!(cfg.frame_log.dir, PathBuf::from("/tmp/frames"));
        assert!(matches!(
            BuddyConfig::load(dir.path().join("missing.yaml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("OpenCV".parse::<CameraBackend>().unwrap(), CameraBackend::Opencv);
        assert_eq!("piper".parse::<SpeechBackend>().unwrap(), SpeechBackend::Piper);
        assert!("alexa".parse::<WakeBackend>().is_err());
    }
}
