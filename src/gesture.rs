use serde::{Deserialize, Serialize};

use crate::{
    config::{Config, MouthConfig, ProximityConfig},
    types::{LandmarkKind, LandmarkPoint, MouthOpenness, ObservationFrame, ProximityResult},
};

/// What a tracker does with its state when no candidate passed the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatePolicy {
    /// Keep the previous state.
    #[default]
    Sticky,
    /// Fall back to `false`.
    Strict,
}

/// Decide whether `a` is within `distance_threshold` of `b`.
///
/// Returns `None` when either point is below `confidence_threshold` or lies
/// outside the normalized range; no distance is computed in that case.
pub fn classify(
    a: &LandmarkPoint,
    b: &LandmarkPoint,
    confidence_threshold: f32,
    distance_threshold: f32,
) -> Option<ProximityResult> {
    if !a.passes_gate(confidence_threshold) || !b.passes_gate(confidence_threshold) {
        return None;
    }

    let distance = a.position.distance(&b.position);
    Some(ProximityResult {
        is_close: distance < distance_threshold,
        distance,
    })
}

/// OR together every produced result. With nothing produced, the policy
/// decides between `previous` and `false`.
pub fn aggregate<I>(results: I, previous: bool, policy: StatePolicy) -> bool
where
    I: IntoIterator<Item = Option<ProximityResult>>,
{
    let mut any_result = false;
    let mut any_close = false;
    for result in results.into_iter().flatten() {
        any_result = true;
        any_close |= result.is_close;
    }

    if any_result {
        any_close
    } else {
        match policy {
            StatePolicy::Sticky => previous,
            StatePolicy::Strict => false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProximityClassifier {
    pub confidence_threshold: f32,
    pub distance_threshold: f32,
}

impl ProximityClassifier {
    pub fn new(confidence_threshold: f32, distance_threshold: f32) -> Self {
        Self {
            confidence_threshold,
            distance_threshold,
        }
    }

    pub fn classify_points(&self, a: &LandmarkPoint, b: &LandmarkPoint) -> Option<ProximityResult> {
        classify(a, b, self.confidence_threshold, self.distance_threshold)
    }

    /// A kind missing from the frame is treated like a point below the gate.
    pub fn classify_frame(
        &self,
        frame: &ObservationFrame,
        reference: LandmarkKind,
        candidate: LandmarkKind,
    ) -> Option<ProximityResult> {
        let reference = frame.get(reference)?;
        let candidate = frame.get(candidate)?;
        self.classify_points(candidate, reference)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProximityRule {
    pub reference: LandmarkKind,
    pub candidates: Vec<LandmarkKind>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerOutcome {
    pub state: bool,
    /// Smallest distance among candidates that passed the gate.
    pub distance: Option<f32>,
    pub declined: bool,
}

/// Holds the aggregate "close" flag across frames.
pub struct GestureTracker {
    classifier: ProximityClassifier,
    rule: ProximityRule,
    policy: StatePolicy,
    state: bool,
}

impl GestureTracker {
    pub fn new(classifier: ProximityClassifier, rule: ProximityRule, policy: StatePolicy) -> Self {
        Self {
            classifier,
            rule,
            policy,
            state: false,
        }
    }

    pub fn from_config(config: &ProximityConfig) -> Self {
        Self::new(
            ProximityClassifier::new(config.confidence_threshold, config.distance_threshold),
            ProximityRule {
                reference: config.reference,
                candidates: config.candidates.clone(),
            },
            config.policy,
        )
    }

    pub fn state(&self) -> bool {
        self.state
    }

    pub fn update(&mut self, frame: &ObservationFrame) -> TrackerOutcome {
        let results: Vec<Option<ProximityResult>> = self
            .rule
            .candidates
            .iter()
            .map(|&candidate| {
                self.classifier
                    .classify_frame(frame, self.rule.reference, candidate)
            })
            .collect();

        let distance = results
            .iter()
            .flatten()
            .map(|r| r.distance)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let declined = distance.is_none();

        self.state = aggregate(results, self.state, self.policy);

        TrackerOutcome {
            state: self.state,
            distance,
            declined,
        }
    }
}

/// Mouth open/closed from the lip opening relative to the mouth width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MouthOpennessClassifier {
    pub confidence_threshold: f32,
    pub open_ratio_threshold: f32,
}

impl MouthOpennessClassifier {
    pub fn new(confidence_threshold: f32, open_ratio_threshold: f32) -> Self {
        Self {
            confidence_threshold,
            open_ratio_threshold,
        }
    }

    pub fn from_config(config: &MouthConfig) -> Self {
        Self::new(config.confidence_threshold, config.open_ratio_threshold)
    }

    pub fn classify_points(
        &self,
        upper: &LandmarkPoint,
        lower: &LandmarkPoint,
        left: &LandmarkPoint,
        right: &LandmarkPoint,
    ) -> Option<MouthOpenness> {
        if [upper, lower, left, right]
            .iter()
            .any(|p| !p.passes_gate(self.confidence_threshold))
        {
            return None;
        }

        let vertical = upper.position.distance(&lower.position);
        let horizontal = left.position.distance(&right.position);
        if !(horizontal > 0.0 && horizontal.is_finite()) {
            return None;
        }

        let ratio = vertical / horizontal;
        Some(MouthOpenness {
            is_open: ratio > self.open_ratio_threshold,
            ratio,
        })
    }

    pub fn classify_frame(&self, frame: &ObservationFrame) -> Option<MouthOpenness> {
        self.classify_points(
            frame.get(LandmarkKind::UpperLip)?,
            frame.get(LandmarkKind::LowerLip)?,
            frame.get(LandmarkKind::MouthLeftCorner)?,
            frame.get(LandmarkKind::MouthRightCorner)?,
        )
    }
}

pub struct MouthTracker {
    classifier: MouthOpennessClassifier,
    policy: StatePolicy,
    open: bool,
}

impl MouthTracker {
    pub fn new(classifier: MouthOpennessClassifier, policy: StatePolicy) -> Self {
        Self {
            classifier,
            policy,
            open: false,
        }
    }

    /// Returns `None` when mouth tracking is disabled in `config`.
    pub fn from_config(config: &Config) -> Option<Self> {
        config.mouth.enabled.then(|| {
            Self::new(
                MouthOpennessClassifier::from_config(&config.mouth),
                config.proximity.policy,
            )
        })
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn update(&mut self, frame: &ObservationFrame) -> Option<MouthOpenness> {
        let result = self.classifier.classify_frame(frame);
        self.open = match (result, self.policy) {
            (Some(r), _) => r.is_open,
            (None, StatePolicy::Sticky) => self.open,
            (None, StatePolicy::Strict) => false,
        };
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn body_tracker(policy: StatePolicy) -> GestureTracker {
        GestureTracker::new(
            ProximityClassifier::new(0.4, 0.3),
            ProximityRule {
                reference: LandmarkKind::Nose,
                candidates: vec![LandmarkKind::LeftWrist, LandmarkKind::RightWrist],
            },
            policy,
        )
    }

    fn close_frame(sequence: u64) -> ObservationFrame {
        ObservationFrame::new(sequence)
            .with_landmark(LandmarkKind::Nose, LandmarkPoint::new(0.5, 0.5, 0.9))
            .with_landmark(LandmarkKind::LeftWrist, LandmarkPoint::new(0.55, 0.54, 0.9))
            .with_landmark(LandmarkKind::RightWrist, LandmarkPoint::new(0.95, 0.9, 0.9))
    }

    fn gated_frame(sequence: u64) -> ObservationFrame {
        ObservationFrame::new(sequence)
            .with_landmark(LandmarkKind::Nose, LandmarkPoint::new(0.5, 0.5, 0.9))
            .with_landmark(LandmarkKind::LeftWrist, LandmarkPoint::new(0.9, 0.9, 0.1))
            .with_landmark(LandmarkKind::RightWrist, LandmarkPoint::new(0.1, 0.1, 0.2))
    }

    #[test]
    fn symmetric_for_gated_points() {
        let pairs = [
            ((0.1, 0.2), (0.4, 0.6)),
            ((0.9, 0.1), (0.85, 0.12)),
            ((0.0, 0.0), (1.0, 1.0)),
        ];
        for ((ax, ay), (bx, by)) in pairs {
            let a = LandmarkPoint::new(ax, ay, 0.8);
            let b = LandmarkPoint::new(bx, by, 0.6);
            let ab = classify(&a, &b, 0.4, 0.3).unwrap();
            let ba = classify(&b, &a, 0.4, 0.3).unwrap();
            assert_eq!(ab, ba);
        }
    }

    #[test]
    fn same_point_is_close() {
        let a = LandmarkPoint::new(0.3, 0.7, 1.0);
        for threshold in [1e-6, 0.1, 0.3] {
            let result = classify(&a, &a, 0.4, threshold).unwrap();
            assert_eq!(result.distance, 0.0);
            assert!(result.is_close);
        }
    }

    #[test]
    fn distance_equal_to_threshold_is_not_close() {
        let a = LandmarkPoint::new(0.0, 0.0, 1.0);
        let b = LandmarkPoint::new(0.0, 0.5, 1.0);
        let result = classify(&a, &b, 0.4, 0.5).unwrap();
        assert_eq!(result.distance, 0.5);
        assert!(!result.is_close);
    }

    #[test]
    fn low_confidence_declines_regardless_of_distance() {
        let sure = LandmarkPoint::new(0.5, 0.5, 0.9);
        let unsure = LandmarkPoint::new(0.5, 0.5, 0.39);
        assert_eq!(classify(&sure, &unsure, 0.4, 0.3), None);
        assert_eq!(classify(&unsure, &sure, 0.4, 0.3), None);

        let far_unsure = LandmarkPoint::new(1.0, 1.0, 0.0);
        assert_eq!(classify(&sure, &far_unsure, 0.4, 0.3), None);
    }

    #[test]
    fn wrist_near_nose_at_body_scale() {
        let nose = LandmarkPoint::new(0.50, 0.50, 0.9);
        let wrist = LandmarkPoint::new(0.55, 0.54, 0.9);
        let result = classify(&wrist, &nose, 0.4, 0.3).unwrap();
        assert!((result.distance - 0.0640).abs() < EPS);
        assert!(result.is_close);
    }

    #[test]
    fn fingertip_away_from_mouth_at_face_scale() {
        let mouth = LandmarkPoint::new(0.50, 0.60, 1.0);
        let fingertip = LandmarkPoint::new(0.70, 0.60, 1.0);
        let result = classify(&fingertip, &mouth, 0.4, 0.1).unwrap();
        assert!((result.distance - 0.20).abs() < EPS);
        assert!(!result.is_close);
    }

    #[test]
    fn aggregate_ors_produced_results() {
        let close = Some(ProximityResult {
            is_close: true,
            distance: 0.05,
        });
        let far = Some(ProximityResult {
            is_close: false,
            distance: 0.5,
        });
        assert!(aggregate([far, None, close], false, StatePolicy::Sticky));
        assert!(!aggregate([far, None], true, StatePolicy::Sticky));
        assert!(!aggregate([far], true, StatePolicy::Strict));
    }

    #[test]
    fn aggregate_with_no_results_follows_policy() {
        assert!(aggregate([None, None], true, StatePolicy::Sticky));
        assert!(!aggregate([None, None], false, StatePolicy::Sticky));
        assert!(!aggregate([None, None], true, StatePolicy::Strict));
        assert!(aggregate(std::iter::empty(), true, StatePolicy::Sticky));
    }

    #[test]
    fn sticky_tracker_keeps_state_on_gated_frame() {
        let mut tracker = body_tracker(StatePolicy::Sticky);
        let outcome = tracker.update(&close_frame(1));
        assert!(outcome.state);
        assert!(!outcome.declined);
        assert!((outcome.distance.unwrap() - 0.0640).abs() < EPS);

        let outcome = tracker.update(&gated_frame(2));
        assert!(outcome.state);
        assert!(outcome.declined);
        assert_eq!(outcome.distance, None);
    }

    #[test]
    fn strict_tracker_resets_on_gated_frame() {
        let mut tracker = body_tracker(StatePolicy::Strict);
        assert!(tracker.update(&close_frame(1)).state);
        assert!(!tracker.update(&gated_frame(2)).state);
        assert!(!tracker.state());
    }

    #[test]
    fn missing_landmark_is_like_low_confidence() {
        let classifier = ProximityClassifier::new(0.4, 0.3);
        let frame = ObservationFrame::new(1)
            .with_landmark(LandmarkKind::LeftWrist, LandmarkPoint::new(0.5, 0.5, 1.0));
        assert_eq!(
            classifier.classify_frame(&frame, LandmarkKind::Nose, LandmarkKind::LeftWrist),
            None
        );

        let mut tracker = body_tracker(StatePolicy::Sticky);
        tracker.update(&close_frame(1));
        let outcome = tracker.update(&ObservationFrame::new(2));
        assert!(outcome.state);
        assert!(outcome.declined);
    }

    #[test]
    fn out_of_range_point_cannot_clear_sticky_state() {
        let classifier = ProximityClassifier::new(0.4, 0.3);
        let broken = ObservationFrame::new(2)
            .with_landmark(LandmarkKind::Nose, LandmarkPoint::new(f32::INFINITY, 0.5, 7.0))
            .with_landmark(LandmarkKind::LeftWrist, LandmarkPoint::new(0.55, 0.54, 0.9));
        assert_eq!(
            classifier.classify_frame(&broken, LandmarkKind::Nose, LandmarkKind::LeftWrist),
            None
        );

        let mut tracker = body_tracker(StatePolicy::Sticky);
        tracker.update(&close_frame(1));
        let outcome = tracker.update(&broken);
        assert!(outcome.state);
        assert!(outcome.declined);

        let overconfident = LandmarkPoint::new(0.9, 0.9, 7.0);
        let nose = LandmarkPoint::new(0.5, 0.5, 0.9);
        assert_eq!(classify(&overconfident, &nose, 0.4, 0.3), None);
    }

    #[test]
    fn far_result_overrides_sticky_state() {
        let mut tracker = body_tracker(StatePolicy::Sticky);
        tracker.update(&close_frame(1));
        let far = ObservationFrame::new(2)
            .with_landmark(LandmarkKind::Nose, LandmarkPoint::new(0.5, 0.2, 0.9))
            .with_landmark(LandmarkKind::LeftWrist, LandmarkPoint::new(0.1, 0.9, 0.9));
        let outcome = tracker.update(&far);
        assert!(!outcome.state);
        assert!(!outcome.declined);
    }

    fn mouth_frame(upper_y: f32, confidence: f32) -> ObservationFrame {
        ObservationFrame::new(1)
            .with_landmark(LandmarkKind::UpperLip, LandmarkPoint::new(0.5, upper_y, confidence))
            .with_landmark(LandmarkKind::LowerLip, LandmarkPoint::new(0.5, 0.6, 1.0))
            .with_landmark(LandmarkKind::MouthLeftCorner, LandmarkPoint::new(0.4, 0.58, 1.0))
            .with_landmark(LandmarkKind::MouthRightCorner, LandmarkPoint::new(0.6, 0.58, 1.0))
    }

    #[test]
    fn mouth_ratio_decides_openness() {
        let classifier = MouthOpennessClassifier::new(0.4, 0.35);

        let open = classifier.classify_frame(&mouth_frame(0.5, 1.0)).unwrap();
        assert!((open.ratio - 0.5).abs() < EPS);
        assert!(open.is_open);

        let closed = classifier.classify_frame(&mouth_frame(0.59, 1.0)).unwrap();
        assert!((closed.ratio - 0.05).abs() < EPS);
        assert!(!closed.is_open);
    }

    #[test]
    fn mouth_declines_on_gate_or_degenerate_width() {
        let classifier = MouthOpennessClassifier::new(0.4, 0.35);
        assert_eq!(classifier.classify_frame(&mouth_frame(0.5, 0.1)), None);

        let corner = LandmarkPoint::new(0.5, 0.5, 1.0);
        let upper = LandmarkPoint::new(0.5, 0.4, 1.0);
        let lower = LandmarkPoint::new(0.5, 0.6, 1.0);
        assert_eq!(classifier.classify_points(&upper, &lower, &corner, &corner), None);
    }

    #[test]
    fn mouth_tracker_follows_policy() {
        let classifier = MouthOpennessClassifier::new(0.4, 0.35);

        let mut sticky = MouthTracker::new(classifier, StatePolicy::Sticky);
        sticky.update(&mouth_frame(0.5, 1.0));
        assert!(sticky.is_open());
        assert_eq!(sticky.update(&mouth_frame(0.5, 0.0)), None);
        assert!(sticky.is_open());

        let mut strict = MouthTracker::new(classifier, StatePolicy::Strict);
        strict.update(&mouth_frame(0.5, 1.0));
        strict.update(&mouth_frame(0.5, 0.0));
        assert!(!strict.is_open());
    }
}
