use std::collections::HashMap;

use serde::{
    Deserialize, Deserializer, Serialize,
    de::{IntoDeserializer, value},
};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A detected anatomical point in normalized image coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    #[serde(flatten)]
    pub position: Point,
    pub confidence: f32,
}

impl LandmarkPoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self {
            position: Point::new(x, y),
            confidence,
        }
    }

    /// Coordinates and confidence all finite and inside [0, 1].
    pub fn is_normalized(&self) -> bool {
        [self.position.x, self.position.y, self.confidence]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }

    /// Out-of-range points never pass, whatever their confidence.
    pub fn passes_gate(&self, confidence_threshold: f32) -> bool {
        self.is_normalized() && self.confidence >= confidence_threshold
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkKind {
    Nose,
    LeftWrist,
    RightWrist,
    IndexFingertip,
    MouthCenter,
    UpperLip,
    LowerLip,
    MouthLeftCorner,
    MouthRightCorner,
}

impl LandmarkKind {
    pub fn label(&self) -> &'static str {
        match self {
            LandmarkKind::Nose => "nose",
            LandmarkKind::LeftWrist => "left wrist",
            LandmarkKind::RightWrist => "right wrist",
            LandmarkKind::IndexFingertip => "index fingertip",
            LandmarkKind::MouthCenter => "mouth center",
            LandmarkKind::UpperLip => "upper lip",
            LandmarkKind::LowerLip => "lower lip",
            LandmarkKind::MouthLeftCorner => "mouth left corner",
            LandmarkKind::MouthRightCorner => "mouth right corner",
        }
    }
}

/// Landmarks detected in a single camera frame.
///
/// A kind is absent when the detector could not locate that part. Frames are
/// consumed once; nothing keeps a history of them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationFrame {
    pub sequence: u64,
    #[serde(default, deserialize_with = "known_landmarks")]
    pub landmarks: HashMap<LandmarkKind, LandmarkPoint>,
}

// Detectors report more joints than we classify; unknown names are dropped.
fn known_landmarks<'de, D>(
    deserializer: D,
) -> Result<HashMap<LandmarkKind, LandmarkPoint>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = HashMap::<String, LandmarkPoint>::deserialize(deserializer)?;
    let mut landmarks = HashMap::with_capacity(raw.len());
    for (name, point) in raw {
        let kind: Result<LandmarkKind, value::Error> =
            LandmarkKind::deserialize(name.as_str().into_deserializer());
        match kind {
            Ok(kind) => {
                landmarks.insert(kind, point);
            }
            Err(_) => log::debug!("ignoring unknown landmark {name:?}"),
        }
    }
    Ok(landmarks)
}

impl ObservationFrame {
    pub fn new(sequence: u64) -> Self {
        Self {
            sequence,
            landmarks: HashMap::new(),
        }
    }

    pub fn with_landmark(mut self, kind: LandmarkKind, point: LandmarkPoint) -> Self {
        self.landmarks.insert(kind, point);
        self
    }

    pub fn get(&self, kind: LandmarkKind) -> Option<&LandmarkPoint> {
        self.landmarks.get(&kind)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProximityResult {
    pub is_close: bool,
    pub distance: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MouthOpenness {
    pub is_open: bool,
    pub ratio: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct GestureState {
    pub active: bool,
}

impl GestureState {
    pub fn status_text(&self) -> &'static str {
        if self.active {
            "Escovando..."
        } else {
            "Sem escovar..."
        }
    }

    pub fn status_color(&self) -> &'static str {
        if self.active { "green" } else { "red" }
    }
}

impl From<bool> for GestureState {
    fn from(active: bool) -> Self {
        Self { active }
    }
}
