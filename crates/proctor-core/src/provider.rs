//! The pre-trained landmark capability and its ONNX-backed implementation.
//!
//! The trait keeps the ratio/threshold logic unit-testable with a stub
//! provider returning synthetic landmark sets; the production path wires a
//! face detector and a 68-point landmark regressor together.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::detect::FaceDetector;
use crate::landmarks::LandmarkPredictor;
use crate::types::{FaceRegion, LandmarkSet};

/// File name of the face detection model inside the model directory.
pub const DETECT_MODEL_FILE: &str = "scrfd_500m.onnx";
/// File name of the 68-point landmark model inside the model directory.
pub const LANDMARK_MODEL_FILE: &str = "pfld_68.onnx";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("model file not found: {0} — place the ONNX models in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Opaque face/landmark capability.
///
/// `detect` returns zero or more face regions for a grayscale frame;
/// `landmarks` returns the ordered 68-point set for one region. Implementors
/// must preserve the canonical landmark ordering documented on
/// [`LandmarkSet`].
pub trait LandmarkProvider {
    fn detect(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceRegion>, ProviderError>;

    fn landmarks(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
        region: &FaceRegion,
    ) -> Result<LandmarkSet, ProviderError>;
}

/// Production provider: SCRFD-style detector plus PFLD-style 68-point
/// regressor, both via ONNX Runtime on CPU.
#[derive(Debug)]
pub struct OnnxProvider {
    detector: FaceDetector,
    predictor: LandmarkPredictor,
}

impl OnnxProvider {
    /// Load both models from `model_dir`. Fails fast on a missing file so
    /// startup reports the exact model that needs downloading.
    pub fn load(model_dir: &Path) -> Result<Self, ProviderError> {
        let detector = FaceDetector::load(&model_dir.join(DETECT_MODEL_FILE))?;
        let predictor = LandmarkPredictor::load(&model_dir.join(LANDMARK_MODEL_FILE))?;
        Ok(Self {
            detector,
            predictor,
        })
    }
}

impl LandmarkProvider for OnnxProvider {
    fn detect(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceRegion>, ProviderError> {
        self.detector.detect(gray, width, height)
    }

    fn landmarks(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
        region: &FaceRegion,
    ) -> Result<LandmarkSet, ProviderError> {
        self.predictor.predict(gray, width, height, region)
    }
}

/// Default model directory: `$XDG_DATA_HOME/proctor/models`, falling back to
/// `~/.local/share/proctor/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("proctor/models")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_dir_ends_with_suffix() {
        let dir = default_model_dir();
        assert!(dir.ends_with("proctor/models"), "got {dir:?}");
    }

    #[test]
    fn test_load_missing_model_is_actionable() {
        let err = OnnxProvider::load(Path::new("/nonexistent")).unwrap_err();
        match err {
            ProviderError::ModelNotFound(path) => {
                assert!(path.contains(DETECT_MODEL_FILE));
            }
            other => panic!("expected ModelNotFound, got {other:?}"),
        }
    }
}
