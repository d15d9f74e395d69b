//! Threshold and pipeline configuration, stored as TOML.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    gesture::StatePolicy,
    pipeline::FramePolicy,
    types::LandmarkKind,
};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.4;
pub const BODY_POSE_DISTANCE_THRESHOLD: f32 = 0.3;
pub const FACE_HAND_DISTANCE_THRESHOLD: f32 = 0.1;
pub const DEFAULT_OPEN_RATIO_THRESHOLD: f32 = 0.35;
const DEFAULT_CHANNEL_CAPACITY: usize = 8;

/// Normalized scale the landmarks come from. Body pose points are spread over
/// the whole image, face and hand points over a much smaller region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    BodyPose,
    FaceHand,
}

/// Sections missing from a loaded file take the defaults of `profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConfigFile")]
pub struct Config {
    pub profile: Profile,
    pub proximity: ProximityConfig,
    pub mouth: MouthConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Deserialize)]
struct ConfigFile {
    profile: Option<Profile>,
    proximity: Option<ProximityConfig>,
    mouth: Option<MouthConfig>,
    pipeline: Option<PipelineConfig>,
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        let defaults = Config::for_profile(file.profile.unwrap_or(Profile::BodyPose));
        Self {
            profile: defaults.profile,
            proximity: file.proximity.unwrap_or(defaults.proximity),
            mouth: file.mouth.unwrap_or(defaults.mouth),
            pipeline: file.pipeline.unwrap_or(defaults.pipeline),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityConfig {
    pub confidence_threshold: f32,
    pub distance_threshold: f32,
    pub reference: LandmarkKind,
    pub candidates: Vec<LandmarkKind>,
    #[serde(default)]
    pub policy: StatePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MouthConfig {
    pub enabled: bool,
    pub confidence_threshold: f32,
    pub open_ratio_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub channel_capacity: usize,
    pub frame_policy: FramePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_profile(Profile::BodyPose)
    }
}

impl Default for MouthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            open_ratio_threshold: DEFAULT_OPEN_RATIO_THRESHOLD,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            frame_policy: FramePolicy::Every,
        }
    }
}

impl Config {
    pub fn for_profile(profile: Profile) -> Self {
        let proximity = match profile {
            Profile::BodyPose => ProximityConfig {
                confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
                distance_threshold: BODY_POSE_DISTANCE_THRESHOLD,
                reference: LandmarkKind::Nose,
                candidates: vec![LandmarkKind::LeftWrist, LandmarkKind::RightWrist],
                policy: StatePolicy::default(),
            },
            Profile::FaceHand => ProximityConfig {
                confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
                distance_threshold: FACE_HAND_DISTANCE_THRESHOLD,
                reference: LandmarkKind::MouthCenter,
                candidates: vec![LandmarkKind::IndexFingertip],
                policy: StatePolicy::default(),
            },
        };

        Self {
            profile,
            proximity,
            mouth: MouthConfig {
                enabled: profile == Profile::FaceHand,
                ..MouthConfig::default()
            },
            pipeline: PipelineConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.proximity;
        if !(0.0..=1.0).contains(&p.confidence_threshold) {
            return Err(Error::Config(format!(
                "proximity.confidence_threshold must be in [0, 1], got {}",
                p.confidence_threshold
            )));
        }
        if !(p.distance_threshold > 0.0 && p.distance_threshold.is_finite()) {
            return Err(Error::Config(format!(
                "proximity.distance_threshold must be > 0, got {}",
                p.distance_threshold
            )));
        }
        if p.candidates.is_empty() {
            return Err(Error::Config(
                "proximity.candidates must name at least one landmark".to_string(),
            ));
        }
        if p.candidates.contains(&p.reference) {
            return Err(Error::Config(format!(
                "proximity.reference {:?} must not also be a candidate",
                p.reference
            )));
        }
        if !(0.0..=1.0).contains(&self.mouth.confidence_threshold) {
            return Err(Error::Config(format!(
                "mouth.confidence_threshold must be in [0, 1], got {}",
                self.mouth.confidence_threshold
            )));
        }
        if !(self.mouth.open_ratio_threshold > 0.0 && self.mouth.open_ratio_threshold.is_finite())
        {
            return Err(Error::Config(format!(
                "mouth.open_ratio_threshold must be > 0, got {}",
                self.mouth.open_ratio_threshold
            )));
        }
        if self.pipeline.channel_capacity == 0 {
            return Err(Error::Config(
                "pipeline.channel_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}
