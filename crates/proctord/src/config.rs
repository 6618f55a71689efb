use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use proctor_core::report::{DEFAULT_EYE_THRESHOLD, DEFAULT_MOUTH_THRESHOLD};
use proctor_core::ThresholdConfig;

const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000);

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
    /// Eye-ratio threshold; a ratio below it flags the face.
    pub eye_threshold: f32,
    /// Mouth-ratio threshold; a ratio above it flags the face.
    pub mouth_threshold: f32,
    /// Path of the append-only proctoring event log.
    pub log_path: PathBuf,
    /// Number of warmup frames to discard at startup (camera AGC/AE stabilization).
    pub warmup_frames: usize,
    /// JPEG quality for the streamed frames (1–100).
    pub jpeg_quality: u8,
}

impl Config {
    /// Load configuration from `PROCTOR_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("PROCTOR_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| proctor_core::default_model_dir());

        let listen_addr = std::env::var("PROCTOR_LISTEN_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_LISTEN_ADDR);

        Self {
            camera_device: std::env::var("PROCTOR_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            listen_addr,
            eye_threshold: env_f32("PROCTOR_EYE_THRESHOLD", DEFAULT_EYE_THRESHOLD),
            mouth_threshold: env_f32("PROCTOR_MOUTH_THRESHOLD", DEFAULT_MOUTH_THRESHOLD),
            log_path: std::env::var("PROCTOR_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("proctoring_log.txt")),
            warmup_frames: env_usize("PROCTOR_WARMUP_FRAMES", 4),
            jpeg_quality: env_u8("PROCTOR_JPEG_QUALITY", 80),
        }
    }

    /// The decision thresholds as the core pipeline consumes them.
    pub fn thresholds(&self) -> ThresholdConfig {
        ThresholdConfig {
            eye: self.eye_threshold,
            mouth: self.mouth_threshold,
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u8(key: &str, default: u8) -> u8 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
