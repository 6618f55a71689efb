use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of points in the canonical facial landmark layout.
pub const LANDMARK_COUNT: usize = 68;

/// Index of the first left-eye point (indices 36–41).
pub const LEFT_EYE_START: usize = 36;
/// Index of the first right-eye point (indices 42–47).
pub const RIGHT_EYE_START: usize = 42;
/// Index of the first mouth point (indices 48–67).
pub const MOUTH_START: usize = 48;

/// Points per eye contour.
pub const EYE_POINTS: usize = 6;
/// Points in the mouth contour (outer outline plus inner lip).
pub const MOUTH_POINTS: usize = 20;

/// One facial landmark, in frame pixel coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: i32,
    pub y: i32,
}

impl LandmarkPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another landmark.
    pub fn distance(&self, other: &LandmarkPoint) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dy = (self.y - other.y) as f32;
        (dx * dx + dy * dy).sqrt()
    }
}

/// The 68-point landmark layout for one face, in the canonical anatomical
/// order produced by the landmark model.
///
/// Index invariants: 36–41 = left eye, 42–47 = right eye, 48–67 = mouth.
/// Any substitute landmark source must preserve this exact ordering; the
/// subset accessors below rely on it.
#[derive(Debug, Clone)]
pub struct LandmarkSet {
    points: [LandmarkPoint; LANDMARK_COUNT],
}

impl Serialize for LandmarkSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.points.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LandmarkSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let points = Vec::<LandmarkPoint>::deserialize(deserializer)?;
        let points: [LandmarkPoint; LANDMARK_COUNT] = points
            .try_into()
            .map_err(|v: Vec<LandmarkPoint>| {
                D::Error::invalid_length(v.len(), &"exactly 68 landmark points")
            })?;
        Ok(Self { points })
    }
}

impl LandmarkSet {
    pub fn new(points: [LandmarkPoint; LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[LandmarkPoint; LANDMARK_COUNT] {
        &self.points
    }

    /// The six left-eye contour points: outer corner, two upper-lid points,
    /// inner corner, two lower-lid points.
    pub fn left_eye(&self) -> [LandmarkPoint; EYE_POINTS] {
        std::array::from_fn(|i| self.points[LEFT_EYE_START + i])
    }

    /// The six right-eye contour points, same contour order as the left.
    pub fn right_eye(&self) -> [LandmarkPoint; EYE_POINTS] {
        std::array::from_fn(|i| self.points[RIGHT_EYE_START + i])
    }

    /// The twenty mouth points: outer outline (0–11) then inner lip (12–19).
    pub fn mouth(&self) -> [LandmarkPoint; MOUTH_POINTS] {
        std::array::from_fn(|i| self.points[MOUTH_START + i])
    }
}

/// Bounding rectangle of one detected face, in frame pixels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_set() -> LandmarkSet {
        // Point i sits at (i, 2i) so subset accessors are index-checkable.
        LandmarkSet::new(std::array::from_fn(|i| {
            LandmarkPoint::new(i as i32, 2 * i as i32)
        }))
    }

    #[test]
    fn test_distance_axis_aligned() {
        let a = LandmarkPoint::new(0, 0);
        let b = LandmarkPoint::new(3, 4);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_zero() {
        let a = LandmarkPoint::new(7, -2);
        assert_eq!(a.distance(&a), 0.0);
    }

    #[test]
    fn test_left_eye_indices() {
        let set = numbered_set();
        let eye = set.left_eye();
        assert_eq!(eye[0], LandmarkPoint::new(36, 72));
        assert_eq!(eye[5], LandmarkPoint::new(41, 82));
    }

    #[test]
    fn test_right_eye_indices() {
        let set = numbered_set();
        let eye = set.right_eye();
        assert_eq!(eye[0], LandmarkPoint::new(42, 84));
        assert_eq!(eye[5], LandmarkPoint::new(47, 94));
    }

    #[test]
    fn test_mouth_indices() {
        let set = numbered_set();
        let mouth = set.mouth();
        assert_eq!(mouth[0], LandmarkPoint::new(48, 96));
        assert_eq!(mouth[19], LandmarkPoint::new(67, 134));
    }
}
