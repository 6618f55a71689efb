//! SCRFD-style face detector via ONNX Runtime.
//!
//! Anchor-free decoding over three stride levels with NMS post-processing.
//! The proctoring pipeline only needs boxes, so the kps-less model variant
//! (six output tensors: score and bbox per stride) is used.

use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

use crate::imageops::resize_bilinear;
use crate::provider::ProviderError;
use crate::types::FaceRegion;

const DETECT_INPUT_SIZE: usize = 640;
const DETECT_MEAN: f32 = 127.5;
const DETECT_STD: f32 = 128.0;
const DETECT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DETECT_NMS_THRESHOLD: f32 = 0.4;
const DETECT_STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;

/// Metadata for mapping detections back out of the letterboxed input.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// Output tensor indices for one stride: (score_idx, bbox_idx).
type StrideOutputs = (usize, usize);

/// SCRFD-style face detector.
#[derive(Debug)]
pub struct FaceDetector {
    session: Session,
    /// Per-stride (score, bbox) output indices for strides [8, 16, 32],
    /// discovered by tensor name at load time with a positional fallback.
    stride_outputs: [StrideOutputs; 3],
}

impl FaceDetector {
    /// Load the detection model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, ProviderError> {
        if !model_path.exists() {
            return Err(ProviderError::ModelNotFound(
                model_path.to_string_lossy().into_owned(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = %model_path.display(),
            outputs = ?output_names,
            "loaded face detection model"
        );

        if output_names.len() < 6 {
            return Err(ProviderError::InferenceFailed(format!(
                "detection model requires 6 outputs (3 strides × score/bbox), got {}",
                output_names.len()
            )));
        }

        let stride_outputs = discover_stride_outputs(&output_names);
        tracing::debug!(?stride_outputs, "detection output tensor mapping");

        Ok(Self {
            session,
            stride_outputs,
        })
    }

    /// Detect faces in a grayscale frame, most confident first.
    pub fn detect(
        &mut self,
        gray: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceRegion>, ProviderError> {
        let (input, letterbox) = preprocess(gray, width as usize, height as usize);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut detections = Vec::new();
        for (stride_pos, &stride) in DETECT_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx) = self.stride_outputs[stride_pos];

            let (_, scores) = outputs[score_idx].try_extract_tensor::<f32>().map_err(|e| {
                ProviderError::InferenceFailed(format!("scores stride {stride}: {e}"))
            })?;
            let (_, bboxes) = outputs[bbox_idx].try_extract_tensor::<f32>().map_err(|e| {
                ProviderError::InferenceFailed(format!("bboxes stride {stride}: {e}"))
            })?;

            decode_stride(scores, bboxes, stride, &letterbox, &mut detections);
        }

        let mut regions = nms(detections, DETECT_NMS_THRESHOLD);
        regions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(regions)
    }
}

/// Letterbox a grayscale frame into the square NCHW input tensor.
///
/// The frame is scaled to fit, centered, and padded with the model mean so
/// padding normalizes to zero; grayscale is replicated across the three
/// input channels.
fn preprocess(gray: &[u8], width: usize, height: usize) -> (Array4<f32>, Letterbox) {
    let scale = (DETECT_INPUT_SIZE as f32 / width as f32)
        .min(DETECT_INPUT_SIZE as f32 / height as f32);

    let new_w = (width as f32 * scale).round() as usize;
    let new_h = (height as f32 * scale).round() as usize;
    let pad_x = (DETECT_INPUT_SIZE - new_w) as f32 / 2.0;
    let pad_y = (DETECT_INPUT_SIZE - new_h) as f32 / 2.0;

    let resized = resize_bilinear(gray, width, height, new_w, new_h);

    let x_start = pad_x.floor() as usize;
    let y_start = pad_y.floor() as usize;

    let mut tensor = Array4::<f32>::zeros((1, 3, DETECT_INPUT_SIZE, DETECT_INPUT_SIZE));
    for y in 0..DETECT_INPUT_SIZE {
        for x in 0..DETECT_INPUT_SIZE {
            let inside =
                y >= y_start && y < y_start + new_h && x >= x_start && x < x_start + new_w;
            let pixel = if inside {
                resized[(y - y_start) * new_w + (x - x_start)] as f32
            } else {
                DETECT_MEAN
            };
            let normalized = (pixel - DETECT_MEAN) / DETECT_STD;
            for channel in 0..3 {
                tensor[[0, channel, y, x]] = normalized;
            }
        }
    }

    (
        tensor,
        Letterbox {
            scale,
            pad_x,
            pad_y,
        },
    )
}

/// Discover (score, bbox) output ordering by tensor name.
///
/// Named exports look like "score_8"/"bbox_8" per stride; numeric exports
/// fall back to the standard positional layout [0–2]=scores, [3–5]=bboxes.
fn discover_stride_outputs(names: &[String]) -> [StrideOutputs; 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let named = DETECT_STRIDES
        .iter()
        .all(|&s| find("score", s).is_some() && find("bbox", s).is_some());

    if named {
        std::array::from_fn(|i| {
            let stride = DETECT_STRIDES[i];
            (find("score", stride).unwrap(), find("bbox", stride).unwrap())
        })
    } else {
        tracing::info!(
            ?names,
            "detection output names not recognized, using positional mapping [0-2]=scores, [3-5]=bboxes"
        );
        [(0, 3), (1, 4), (2, 5)]
    }
}

/// Decode one stride level's anchors into frame-space regions.
fn decode_stride(
    scores: &[f32],
    bboxes: &[f32],
    stride: usize,
    letterbox: &Letterbox,
    out: &mut Vec<FaceRegion>,
) {
    let grid = DETECT_INPUT_SIZE / stride;
    let num_anchors = grid * grid * ANCHORS_PER_CELL;

    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= DETECT_CONFIDENCE_THRESHOLD {
            continue;
        }

        let cell = idx / ANCHORS_PER_CELL;
        let anchor_cx = (cell % grid) as f32 * stride as f32;
        let anchor_cy = (cell / grid) as f32 * stride as f32;

        let off = idx * 4;
        if off + 3 >= bboxes.len() {
            continue;
        }
        // Offsets are distances from the anchor center to each box edge,
        // in stride units.
        let x1 = anchor_cx - bboxes[off] * stride as f32;
        let y1 = anchor_cy - bboxes[off + 1] * stride as f32;
        let x2 = anchor_cx + bboxes[off + 2] * stride as f32;
        let y2 = anchor_cy + bboxes[off + 3] * stride as f32;

        // De-letterbox into original frame coordinates.
        let fx1 = (x1 - letterbox.pad_x) / letterbox.scale;
        let fy1 = (y1 - letterbox.pad_y) / letterbox.scale;
        let fx2 = (x2 - letterbox.pad_x) / letterbox.scale;
        let fy2 = (y2 - letterbox.pad_y) / letterbox.scale;

        out.push(FaceRegion {
            x: fx1,
            y: fy1,
            width: fx2 - fx1,
            height: fy2 - fy1,
            confidence: score,
        });
    }
}

/// Non-maximum suppression over candidate regions.
fn nms(mut detections: Vec<FaceRegion>, iou_threshold: f32) -> Vec<FaceRegion> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i].clone());
        for j in (i + 1)..detections.len() {
            if !suppressed[j] && iou(&detections[i], &detections[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Intersection-over-union of two regions.
fn iou(a: &FaceRegion, b: &FaceRegion) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
