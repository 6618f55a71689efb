//! 68-point facial landmark regressor via ONNX Runtime.
//!
//! PFLD-style model: a square face crop resized to 112×112 goes in, 136
//! floats (68 x/y pairs normalized to the crop) come out. Predictions are
//! mapped back to integer frame coordinates.

use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

use crate::imageops::{crop_square, resize_bilinear};
use crate::provider::ProviderError;
use crate::types::{FaceRegion, LandmarkPoint, LandmarkSet, LANDMARK_COUNT};

const LANDMARK_INPUT_SIZE: usize = 112;
const LANDMARK_OUTPUT_DIM: usize = 2 * LANDMARK_COUNT;
/// The crop takes the detection box expanded by this fraction on each side;
/// the chin and brow landmarks sit slightly outside a tight detector box.
const CROP_MARGIN: f32 = 0.2;

/// PFLD-style 68-point landmark predictor.
#[derive(Debug)]
pub struct LandmarkPredictor {
    session: Session,
}

impl LandmarkPredictor {
    /// Load the landmark model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, ProviderError> {
        if !model_path.exists() {
            return Err(ProviderError::ModelNotFound(
                model_path.to_string_lossy().into_owned(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded landmark model"
        );

        Ok(Self { session })
    }

    /// Predict the 68-point landmark set for one detected face.
    pub fn predict(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
        region: &FaceRegion,
    ) -> Result<LandmarkSet, ProviderError> {
        let (x0, y0, side) = crop_box(region);

        let crop = crop_square(gray, width as usize, height as usize, x0, y0, side);
        let resized = resize_bilinear(&crop, side, side, LANDMARK_INPUT_SIZE, LANDMARK_INPUT_SIZE);
        let input = preprocess(&resized);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ProviderError::InferenceFailed(format!("landmark regression: {e}")))?;

        if raw.len() != LANDMARK_OUTPUT_DIM {
            return Err(ProviderError::InferenceFailed(format!(
                "expected {LANDMARK_OUTPUT_DIM} landmark outputs, got {}",
                raw.len()
            )));
        }

        Ok(map_points(raw, x0, y0, side))
    }
}

/// Square crop window for a detection box: centered on the box, sides equal
/// to the longer box edge expanded by [`CROP_MARGIN`]. May extend past the
/// frame; the crop itself zero-pads.
fn crop_box(region: &FaceRegion) -> (i32, i32, usize) {
    let cx = region.x + region.width / 2.0;
    let cy = region.y + region.height / 2.0;
    let side = (region.width.max(region.height) * (1.0 + CROP_MARGIN)).round().max(1.0);

    let x0 = (cx - side / 2.0).round() as i32;
    let y0 = (cy - side / 2.0).round() as i32;
    (x0, y0, side as usize)
}

/// Scale a 112×112 crop into the normalized NCHW input tensor, grayscale
/// replicated over three channels.
fn preprocess(resized: &[u8]) -> Array4<f32> {
    let size = LANDMARK_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            let value = resized.get(y * size + x).copied().unwrap_or(0) as f32 / 255.0;
            for channel in 0..3 {
                tensor[[0, channel, y, x]] = value;
            }
        }
    }
    tensor
}

/// Map crop-normalized model outputs into integer frame coordinates.
fn map_points(raw: &[f32], x0: i32, y0: i32, side: usize) -> LandmarkSet {
    let side = side as f32;
    LandmarkSet::new(std::array::from_fn(|i| {
        let nx = raw[i * 2];
        let ny = raw[i * 2 + 1];
        LandmarkPoint::new(
            x0 + (nx * side).round() as i32,
            y0 + (ny * side).round() as i32,
        )
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_box_is_square_and_centered() {
        let region = FaceRegion {
            x: 100.0,
            y: 200.0,
            width: 100.0,
            height: 80.0,
            confidence: 0.9,
        };
        let (x0, y0, side) = crop_box(&region);
        assert_eq!(side, 120); // 100 * 1.2
        // Center preserved: (150, 240).
        assert_eq!(x0, 150 - 60);
        assert_eq!(y0, 240 - 60);
    }

    #[test]
    fn test_crop_box_may_extend_past_origin() {
        let region = FaceRegion {
            x: 0.0,
            y: 0.0,
            width: 50.0,
            height: 50.0,
            confidence: 0.9,
        };
        let (x0, y0, side) = crop_box(&region);
        assert_eq!(side, 60);
        assert!(x0 < 0 && y0 < 0);
    }

    #[test]
    fn test_crop_box_degenerate_region_has_positive_side() {
        let region = FaceRegion {
            x: 10.0,
            y: 10.0,
            width: 0.0,
            height: 0.0,
            confidence: 0.5,
        };
        let (_, _, side) = crop_box(&region);
        assert!(side >= 1);
    }

    #[test]
    fn test_map_points_corners() {
        let mut raw = vec![0.0f32; LANDMARK_OUTPUT_DIM];
        // Point 0 at the crop origin, point 1 at the far corner,
        // point 2 at the center.
        raw[2] = 1.0;
        raw[3] = 1.0;
        raw[4] = 0.5;
        raw[5] = 0.5;

        let set = map_points(&raw, 30, 40, 100);
        let points = set.points();
        assert_eq!(points[0], LandmarkPoint::new(30, 40));
        assert_eq!(points[1], LandmarkPoint::new(130, 140));
        assert_eq!(points[2], LandmarkPoint::new(80, 90));
    }

    #[test]
    fn test_preprocess_scales_to_unit_range() {
        let resized = vec![255u8; LANDMARK_INPUT_SIZE * LANDMARK_INPUT_SIZE];
        let tensor = preprocess(&resized);
        assert_eq!(tensor[[0, 0, 0, 0]], 1.0);
        assert_eq!(tensor[[0, 2, 111, 111]], 1.0);
    }
}
