//! Eye and mouth aspect ratios.
//!
//! Both ratios relate vertical landmark distances to a horizontal reference
//! distance using the same three-distance form `(A + B) / (2C)`. The eye
//! ratio falls as the lids close; the mouth ratio rises as the mouth opens.
//! The opposing senses are deliberate — the downstream thresholds are tuned
//! against them.

use crate::types::{LandmarkPoint, EYE_POINTS, MOUTH_POINTS};

// Inner-lip sub-indices of the 20-point mouth contour used by the mouth
// ratio. 12/16 are the inner corners; 13/19 and 14/18 are the upper/lower
// inner-lip pairs.
const MOUTH_WIDTH: (usize, usize) = (12, 16);
const MOUTH_GAP_A: (usize, usize) = (13, 19);
const MOUTH_GAP_B: (usize, usize) = (14, 18);

/// Eye aspect ratio over the six-point eye contour.
///
/// Expects the canonical contour order: outer corner, two upper-lid points,
/// inner corner, two lower-lid points (landmark indices 36–41 or 42–47).
/// Returns `None` when the corner-to-corner width is zero — a degenerate
/// detection that permits no determination this frame.
pub fn eye_aspect_ratio(eye: &[LandmarkPoint; EYE_POINTS]) -> Option<f32> {
    let a = eye[1].distance(&eye[5]);
    let b = eye[2].distance(&eye[4]);
    let c = eye[0].distance(&eye[3]);
    if c == 0.0 {
        return None;
    }
    Some((a + b) / (2.0 * c))
}

/// Mouth aspect ratio over the 20-point mouth contour.
///
/// Uses only the inner-lip points: vertical gaps 13–19 and 14–18 against
/// the inner corner width 12–16. Same zero-width guard as the eye ratio.
pub fn mouth_aspect_ratio(mouth: &[LandmarkPoint; MOUTH_POINTS]) -> Option<f32> {
    let a = mouth[MOUTH_GAP_A.0].distance(&mouth[MOUTH_GAP_A.1]);
    let b = mouth[MOUTH_GAP_B.0].distance(&mouth[MOUTH_GAP_B.1]);
    let c = mouth[MOUTH_WIDTH.0].distance(&mouth[MOUTH_WIDTH.1]);
    if c == 0.0 {
        return None;
    }
    Some((a + b) / (2.0 * c))
}
