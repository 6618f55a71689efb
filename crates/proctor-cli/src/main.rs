use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use proctor_core::events::{self, EventLog};
use proctor_core::report::{DEFAULT_EYE_THRESHOLD, DEFAULT_MOUTH_THRESHOLD};
use proctor_core::{analyze_frame, overlay, FrameReport, OnnxProvider, ThresholdConfig};
use proctor_hw::{Camera, FrameStream};

/// Frames discarded after opening the camera (AGC/AE stabilization).
const WARMUP_FRAMES: usize = 4;

#[derive(Parser)]
#[command(name = "proctor", about = "Remote proctoring CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct CaptureArgs {
    /// V4L2 device path
    #[arg(short, long, default_value = "/dev/video0")]
    device: String,
    /// Directory containing the ONNX models (default: the XDG data dir)
    #[arg(long)]
    model_dir: Option<PathBuf>,
    /// Eye-ratio threshold; a ratio below it flags the face
    #[arg(long, default_value_t = DEFAULT_EYE_THRESHOLD)]
    eye_threshold: f32,
    /// Mouth-ratio threshold; a ratio above it flags the face
    #[arg(long, default_value_t = DEFAULT_MOUTH_THRESHOLD)]
    mouth_threshold: f32,
}

impl CaptureArgs {
    fn model_dir(&self) -> PathBuf {
        self.model_dir
            .clone()
            .unwrap_or_else(proctor_core::default_model_dir)
    }

    fn thresholds(&self) -> ThresholdConfig {
        ThresholdConfig {
            eye: self.eye_threshold,
            mouth: self.mouth_threshold,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List available capture devices
    Devices,
    /// Capture one frame and print its evaluation as JSON
    Check {
        #[command(flatten)]
        capture: CaptureArgs,
    },
    /// Watch the camera, printing one evaluation line per frame
    Watch {
        #[command(flatten)]
        capture: CaptureArgs,
        /// Append proctoring events to this log file
        #[arg(long, default_value = "proctoring_log.txt")]
        log_path: PathBuf,
        /// Save annotated frames as JPEGs into this directory
        #[arg(long)]
        save_dir: Option<PathBuf>,
        /// Stop after this many frames (default: run until interrupted)
        #[arg(long)]
        frames: Option<u64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices => run_devices(),
        Commands::Check { capture } => run_check(&capture),
        Commands::Watch {
            capture,
            log_path,
            save_dir,
            frames,
        } => run_watch(&capture, &log_path, save_dir.as_deref(), frames),
    }
}

fn run_devices() -> Result<()> {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("no capture devices found");
        return Ok(());
    }
    for dev in devices {
        println!("{}  {} ({})", dev.path, dev.name, dev.driver);
    }
    Ok(())
}

/// Open the camera and discard the warmup frames.
fn open_session(args: &CaptureArgs) -> Result<(Camera, OnnxProvider)> {
    let provider = OnnxProvider::load(&args.model_dir())
        .with_context(|| format!("loading models from {}", args.model_dir().display()))?;
    let camera = Camera::open(&args.device)
        .with_context(|| format!("opening camera {}", args.device))?;
    Ok((camera, provider))
}

fn warmup(stream: &mut FrameStream<'_>) {
    for _ in 0..WARMUP_FRAMES {
        let _ = stream.next_frame();
    }
}

fn run_check(args: &CaptureArgs) -> Result<()> {
    let (camera, mut provider) = open_session(args)?;
    let mut stream = camera.stream()?;
    warmup(&mut stream);

    let frame = stream.next_frame()?;
    let report = analyze_frame(
        &mut provider,
        &frame.gray,
        frame.width,
        frame.height,
        &args.thresholds(),
    )?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_watch(
    args: &CaptureArgs,
    log_path: &std::path::Path,
    save_dir: Option<&std::path::Path>,
    max_frames: Option<u64>,
) -> Result<()> {
    let (camera, mut provider) = open_session(args)?;
    let mut event_log = EventLog::open(log_path)
        .with_context(|| format!("opening event log {}", log_path.display()))?;
    if let Some(dir) = save_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    let mut stream = camera.stream()?;
    warmup(&mut stream);

    let thresholds = args.thresholds();
    let mut processed = 0u64;

    loop {
        // A read failure ends the session; the stream is released on return.
        let mut frame = stream
            .next_frame()
            .context("frame read failed; ending session")?;

        let report = analyze_frame(
            &mut provider,
            &frame.gray,
            frame.width,
            frame.height,
            &thresholds,
        )?;

        events::record_frame(&mut event_log, &report);
        print_frame_line(frame.sequence, &report);

        if let Some(dir) = save_dir {
            overlay::annotate(&mut frame.rgb, frame.width, frame.height, &report);
            let path = dir.join(format!("frame_{:06}.jpg", frame.sequence));
            save_jpeg(&frame.rgb, frame.width, frame.height, &path)?;
        }

        processed += 1;
        if max_frames.is_some_and(|limit| processed >= limit) {
            break;
        }
    }

    Ok(())
}

fn print_frame_line(sequence: u32, report: &FrameReport) {
    let eyes = if report.any_suspicious_eyes() { "SUSPICIOUS" } else { "ok" };
    let mouth = if report.any_suspicious_mouth() { "SUSPICIOUS" } else { "ok" };
    println!(
        "frame {:>6}  people={}  eyes={}  mouth={}",
        sequence, report.people_count, eyes, mouth
    );
}

fn save_jpeg(rgb: &[u8], width: u32, height: u32, path: &std::path::Path) -> Result<()> {
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 90)
        .encode(rgb, width, height, image::ExtendedColorType::Rgb8)
        .with_context(|| format!("encoding {}", path.display()))?;
    std::fs::write(path, out).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
