//! Per-frame orchestration: detect faces, predict landmarks, screen each
//! face against the fixed thresholds.
//!
//! Every frame is evaluated independently — there is no temporal smoothing,
//! hysteresis, or debounce, so a single noisy frame can toggle a flag.

use serde::Serialize;

use crate::provider::{LandmarkProvider, ProviderError};
use crate::ratios::{eye_aspect_ratio, mouth_aspect_ratio};
use crate::types::{FaceRegion, LandmarkSet};

/// Default eye-ratio threshold; an eye ratio below it flags the face.
pub const DEFAULT_EYE_THRESHOLD: f32 = 0.14;
/// Default mouth-ratio threshold; a mouth ratio above it flags the face.
pub const DEFAULT_MOUTH_THRESHOLD: f32 = 0.10;

/// Fixed decision thresholds, set once at process start.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ThresholdConfig {
    pub eye: f32,
    pub mouth: f32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            eye: DEFAULT_EYE_THRESHOLD,
            mouth: DEFAULT_MOUTH_THRESHOLD,
        }
    }
}

/// Ratio screening for one detected face.
///
/// A `None` ratio (degenerate landmark geometry) contributes no flag: the
/// frame simply permits no determination for that eye or the mouth.
#[derive(Debug, Clone, Serialize)]
pub struct FaceScreening {
    pub left_ear: Option<f32>,
    pub right_ear: Option<f32>,
    pub mouth_ratio: Option<f32>,
    pub suspicious_eyes: bool,
    pub suspicious_mouth: bool,
}

impl FaceScreening {
    /// Screen one face's landmarks against the thresholds.
    pub fn from_landmarks(landmarks: &LandmarkSet, thresholds: &ThresholdConfig) -> Self {
        let left_ear = eye_aspect_ratio(&landmarks.left_eye());
        let right_ear = eye_aspect_ratio(&landmarks.right_eye());
        let mouth_ratio = mouth_aspect_ratio(&landmarks.mouth());

        let eye_closed = |ratio: Option<f32>| ratio.is_some_and(|r| r < thresholds.eye);
        let suspicious_eyes = eye_closed(left_ear) || eye_closed(right_ear);
        // Inverted sense relative to the eyes: the mouth flag fires when the
        // ratio EXCEEDS its threshold.
        let suspicious_mouth = mouth_ratio.is_some_and(|r| r > thresholds.mouth);

        Self {
            left_ear,
            right_ear,
            mouth_ratio,
            suspicious_eyes,
            suspicious_mouth,
        }
    }
}

/// One detected face with its region, landmarks, and screening result.
#[derive(Debug, Clone, Serialize)]
pub struct FaceObservation {
    pub region: FaceRegion,
    pub landmarks: LandmarkSet,
    pub screening: FaceScreening,
}

/// Evaluation of a single frame. Nothing here survives to the next frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    /// Number of faces detected in this frame.
    pub people_count: usize,
    pub faces: Vec<FaceObservation>,
}

impl FrameReport {
    /// Whether this frame warrants a single "multiple people" event.
    pub fn multiple_people(&self) -> bool {
        self.people_count >= 2
    }

    pub fn any_suspicious_eyes(&self) -> bool {
        self.faces.iter().any(|f| f.screening.suspicious_eyes)
    }

    pub fn any_suspicious_mouth(&self) -> bool {
        self.faces.iter().any(|f| f.screening.suspicious_mouth)
    }
}

/// Run the full per-frame pipeline over a grayscale frame.
pub fn analyze_frame<P: LandmarkProvider + ?Sized>(
    provider: &mut P,
    gray: &[u8],
    width: u32,
    height: u32,
    thresholds: &ThresholdConfig,
) -> Result<FrameReport, ProviderError> {
    let regions = provider.detect(gray, width, height)?;
    let people_count = regions.len();

    let mut faces = Vec::with_capacity(people_count);
    for region in regions {
        let landmarks = provider.landmarks(gray, width, height, &region)?;
        let screening = FaceScreening::from_landmarks(&landmarks, thresholds);
        faces.push(FaceObservation {
            region,
            landmarks,
            screening,
        });
    }

    Ok(FrameReport {
        people_count,
        faces,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LandmarkPoint, LANDMARK_COUNT, LEFT_EYE_START, MOUTH_START, RIGHT_EYE_START};

    /// Stub provider returning a fixed synthetic scene; no model involved.
    struct StubProvider {
        faces: Vec<LandmarkSet>,
    }

    impl LandmarkProvider for StubProvider {
        fn detect(
            &mut self,
            _gray: &[u8],
            _width: u32,
            _height: u32,
        ) -> Result<Vec<FaceRegion>, ProviderError> {
            Ok(self
                .faces
                .iter()
                .map(|_| FaceRegion {
                    x: 100.0,
                    y: 100.0,
                    width: 120.0,
                    height: 120.0,
                    confidence: 0.9,
                })
                .collect())
        }

        fn landmarks(
            &mut self,
            _gray: &[u8],
            _width: u32,
            _height: u32,
            _region: &FaceRegion,
        ) -> Result<LandmarkSet, ProviderError> {
            let set = self.faces.remove(0);
            Ok(set)
        }
    }

    /// Landmark set with open eyes and a closed mouth.
    fn neutral_face() -> LandmarkSet {
        let mut points = [LandmarkPoint::new(0, 0); LANDMARK_COUNT];
        let open_eye = [(0, 10), (5, 12), (10, 12), (15, 10), (10, 8), (5, 8)];
        for (i, (x, y)) in open_eye.iter().enumerate() {
            points[LEFT_EYE_START + i] = LandmarkPoint::new(*x, *y);
            points[RIGHT_EYE_START + i] = LandmarkPoint::new(x + 30, *y);
        }
        // Closed mouth: inner lips touching on a 20-wide contour.
        points[MOUTH_START + 12] = LandmarkPoint::new(0, 40);
        points[MOUTH_START + 13] = LandmarkPoint::new(6, 40);
        points[MOUTH_START + 14] = LandmarkPoint::new(14, 40);
        points[MOUTH_START + 16] = LandmarkPoint::new(20, 40);
        points[MOUTH_START + 18] = LandmarkPoint::new(14, 40);
        points[MOUTH_START + 19] = LandmarkPoint::new(6, 40);
        LandmarkSet::new(points)
    }

    /// Neutral face with both eyes collapsed to the corner line.
    fn closed_eye_face() -> LandmarkSet {
        let mut points = *neutral_face().points();
        let closed = [(0, 10), (5, 10), (10, 10), (15, 10), (10, 10), (5, 10)];
        for (i, (x, y)) in closed.iter().enumerate() {
            points[LEFT_EYE_START + i] = LandmarkPoint::new(*x, *y);
            points[RIGHT_EYE_START + i] = LandmarkPoint::new(x + 30, *y);
        }
        LandmarkSet::new(points)
    }

    /// Neutral face with the inner lips pulled wide apart.
    fn open_mouth_face() -> LandmarkSet {
        let mut points = *neutral_face().points();
        points[MOUTH_START + 13] = LandmarkPoint::new(6, 34);
        points[MOUTH_START + 14] = LandmarkPoint::new(14, 34);
        points[MOUTH_START + 18] = LandmarkPoint::new(14, 46);
        points[MOUTH_START + 19] = LandmarkPoint::new(6, 46);
        LandmarkSet::new(points)
    }

    /// Neutral face with a zero-width left eye (all x equal).
    fn degenerate_eye_face() -> LandmarkSet {
        let mut points = *neutral_face().points();
        let degenerate = [(5, 10), (5, 12), (5, 12), (5, 10), (5, 8), (5, 8)];
        for (i, (x, y)) in degenerate.iter().enumerate() {
            points[LEFT_EYE_START + i] = LandmarkPoint::new(*x, *y);
        }
        LandmarkSet::new(points)
    }

    fn analyze(faces: Vec<LandmarkSet>) -> FrameReport {
        let mut provider = StubProvider { faces };
        analyze_frame(&mut provider, &[0u8; 4], 2, 2, &ThresholdConfig::default()).unwrap()
    }

    #[test]
    fn test_empty_frame_no_flags() {
        let report = analyze(vec![]);
        assert_eq!(report.people_count, 0);
        assert!(!report.multiple_people());
        assert!(!report.any_suspicious_eyes());
        assert!(!report.any_suspicious_mouth());
    }

    #[test]
    fn test_neutral_face_no_flags() {
        let report = analyze(vec![neutral_face()]);
        assert_eq!(report.people_count, 1);
        let s = &report.faces[0].screening;
        assert!(s.left_ear.unwrap() > 0.14);
        assert!(!s.suspicious_eyes);
        assert!(!s.suspicious_mouth);
    }

    #[test]
    fn test_closed_eyes_raise_flag() {
        let report = analyze(vec![closed_eye_face()]);
        let s = &report.faces[0].screening;
        assert!(s.left_ear.unwrap() < 1e-6);
        assert!(s.suspicious_eyes);
        assert!(!s.suspicious_mouth);
    }

    #[test]
    fn test_one_closed_eye_is_enough() {
        let mut points = *neutral_face().points();
        let closed = [(0, 10), (5, 10), (10, 10), (15, 10), (10, 10), (5, 10)];
        for (i, (x, y)) in closed.iter().enumerate() {
            points[RIGHT_EYE_START + i] = LandmarkPoint::new(x + 30, *y);
        }
        let report = analyze(vec![LandmarkSet::new(points)]);
        assert!(report.faces[0].screening.suspicious_eyes);
    }

    #[test]
    fn test_open_mouth_raises_flag() {
        let report = analyze(vec![open_mouth_face()]);
        let s = &report.faces[0].screening;
        assert!(s.mouth_ratio.unwrap() > 0.10);
        assert!(s.suspicious_mouth);
        assert!(!s.suspicious_eyes);
    }

    #[test]
    fn test_degenerate_eye_contributes_no_flag() {
        let report = analyze(vec![degenerate_eye_face()]);
        let s = &report.faces[0].screening;
        assert_eq!(s.left_ear, None);
        // The right eye is still open, so no flag either way.
        assert!(!s.suspicious_eyes);
    }

    #[test]
    fn test_two_faces_single_multiple_people_signal() {
        let report = analyze(vec![neutral_face(), neutral_face()]);
        assert_eq!(report.people_count, 2);
        assert!(report.multiple_people());
    }

    #[test]
    fn test_three_faces_count() {
        let report = analyze(vec![neutral_face(), neutral_face(), neutral_face()]);
        assert_eq!(report.people_count, 3);
        assert!(report.multiple_people());
    }

    #[test]
    fn test_report_serializes() {
        let report = analyze(vec![neutral_face()]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["people_count"], 1);
        assert!(json["faces"][0]["screening"]["left_ear"].is_number());
    }
}
