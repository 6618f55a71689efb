//! The capture/analyze/annotate engine.
//!
//! The whole pipeline runs on one dedicated OS thread: the camera stream,
//! both ONNX sessions, and the event log live on it exclusively, so no
//! locking is involved. Finished JPEG frames and a status snapshot are
//! published through `tokio::sync::watch` channels for the HTTP side.

use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;

use proctor_core::events::{self, EventLog};
use proctor_core::{analyze_frame, overlay, OnnxProvider, ThresholdConfig};
use proctor_hw::Camera;

use crate::config::Config;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] proctor_hw::CameraError),
    #[error("provider error: {0}")]
    Provider(#[from] proctor_core::ProviderError),
    #[error("event log error: {0}")]
    EventLog(#[from] std::io::Error),
    #[error("jpeg encoding failed: {0}")]
    Encode(String),
}

/// Latest encoded frame; shared with every feed subscriber.
pub type JpegFrame = Arc<Vec<u8>>;

/// Snapshot of the engine for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub frames_processed: u64,
    pub people_count: usize,
    pub suspicious_eyes: bool,
    pub suspicious_mouth: bool,
}

impl EngineStatus {
    fn startup() -> Self {
        Self {
            running: true,
            frames_processed: 0,
            people_count: 0,
            suspicious_eyes: false,
            suspicious_mouth: false,
        }
    }
}

/// Clone-safe handle to the engine's published state.
#[derive(Clone)]
pub struct EngineHandle {
    frames: watch::Receiver<Option<JpegFrame>>,
    status: watch::Receiver<EngineStatus>,
}

impl EngineHandle {
    /// Subscribe to the annotated frame feed. The channel closes when the
    /// engine session ends.
    pub fn frames(&self) -> watch::Receiver<Option<JpegFrame>> {
        self.frames.clone()
    }

    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    #[cfg(test)]
    pub(crate) fn stub() -> (watch::Sender<Option<JpegFrame>>, watch::Sender<EngineStatus>, Self) {
        let (frame_tx, frames) = watch::channel(None);
        let (status_tx, status) = watch::channel(EngineStatus::startup());
        (frame_tx, status_tx, Self { frames, status })
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Opens the camera, loads both ONNX models, and opens the event log before
/// returning, so an unavailable resource fails startup instead of a silent
/// dead feed. The thread then runs the session loop until the capture
/// stream fails or the process exits.
pub fn spawn_engine(config: &Config) -> Result<EngineHandle, EngineError> {
    let camera = Camera::open(&config.camera_device)?;
    let provider = OnnxProvider::load(&config.model_dir)?;
    let event_log = EventLog::open(&config.log_path)?;

    let thresholds = config.thresholds();
    let warmup_frames = config.warmup_frames;
    let jpeg_quality = config.jpeg_quality;

    let (frame_tx, frame_rx) = watch::channel(None);
    let (status_tx, status_rx) = watch::channel(EngineStatus::startup());

    std::thread::Builder::new()
        .name("proctor-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            let result = run_session(
                &camera,
                provider,
                event_log,
                thresholds,
                warmup_frames,
                jpeg_quality,
                &frame_tx,
                &status_tx,
            );
            if let Err(e) = result {
                tracing::error!(error = %e, "engine session ended");
            } else {
                tracing::info!("engine session ended");
            }
            let last = status_tx.borrow().clone();
            let _ = status_tx.send(EngineStatus {
                running: false,
                ..last
            });
            // Dropping frame_tx closes every feed subscriber.
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle {
        frames: frame_rx,
        status: status_rx,
    })
}

/// One capture session: warmup, then the per-frame loop. Returns when the
/// capture stream fails; the camera and stream are released on exit either
/// way.
#[allow(clippy::too_many_arguments)]
fn run_session(
    camera: &Camera,
    mut provider: OnnxProvider,
    mut event_log: EventLog,
    thresholds: ThresholdConfig,
    warmup_frames: usize,
    jpeg_quality: u8,
    frame_tx: &watch::Sender<Option<JpegFrame>>,
    status_tx: &watch::Sender<EngineStatus>,
) -> Result<(), EngineError> {
    let mut stream = camera.stream()?;

    if warmup_frames > 0 {
        tracing::info!(count = warmup_frames, "discarding warmup frames");
        for _ in 0..warmup_frames {
            let _ = stream.next_frame();
        }
    }

    let mut frames_processed = 0u64;
    loop {
        // A read failure is terminal for the session, not retried.
        let mut frame = stream.next_frame()?;

        let report = analyze_frame(
            &mut provider,
            &frame.gray,
            frame.width,
            frame.height,
            &thresholds,
        )?;

        events::record_frame(&mut event_log, &report);

        overlay::annotate(&mut frame.rgb, frame.width, frame.height, &report);
        let jpeg = encode_jpeg(&frame.rgb, frame.width, frame.height, jpeg_quality)?;

        frames_processed += 1;
        let _ = frame_tx.send(Some(Arc::new(jpeg)));
        let _ = status_tx.send(EngineStatus {
            running: true,
            frames_processed,
            people_count: report.people_count,
            suspicious_eyes: report.any_suspicious_eyes(),
            suspicious_mouth: report.any_suspicious_mouth(),
        });
    }
}

fn encode_jpeg(rgb: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>, EngineError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(rgb, width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| EngineError::Encode(e.to_string()))?;
    Ok(out)
}
