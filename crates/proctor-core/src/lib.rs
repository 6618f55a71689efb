//! proctor-core — landmark-ratio evaluation for the proctoring pipeline.
//!
//! Face detection and 68-point landmark regression are delegated to
//! pre-trained ONNX models behind the [`LandmarkProvider`] trait; the code
//! here extracts fixed landmark subsets, computes eye/mouth aspect ratios,
//! compares them against configured thresholds, and draws frame overlays.

pub mod detect;
pub mod events;
mod imageops;
pub mod landmarks;
pub mod overlay;
pub mod provider;
pub mod ratios;
pub mod report;
pub mod types;

pub use provider::{default_model_dir, LandmarkProvider, OnnxProvider, ProviderError};
pub use report::{analyze_frame, FaceScreening, FrameReport, ThresholdConfig};
pub use types::{FaceRegion, LandmarkPoint, LandmarkSet};
