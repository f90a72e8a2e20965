//! Rule-table classification of smoothed gaze into focus verdicts.
//!
//! Rules are evaluated top-down and the first match wins. Each rule carries
//! its condition, reported direction, debounced label, score curve and
//! effect on the stable-frame counter. Frame-run counters add hysteresis:
//! sustained focus earns a bonus, sustained distraction a penalty, and a
//! short face loss is tolerated before it is reported.

use crate::core::sample::{DistractionType, GazeDirection};
use crate::core::signal::GazeVector;
use serde::{Deserialize, Serialize};

/// Linear score decay with a floor.
///
/// `score = 100 - excess * slope`, never below `floor` (or `labeled_floor`
/// once the rule's label is visible). Gaze rules pass the deviation past
/// their threshold as `excess`; the tilt rule passes the raw tilt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreCurve {
    pub slope: f64,
    pub floor: f64,
    pub labeled_floor: f64,
}

impl ScoreCurve {
    pub const fn new(slope: f64, floor: f64, labeled_floor: f64) -> Self {
        Self {
            slope,
            floor,
            labeled_floor,
        }
    }

    pub fn score(&self, excess: f64, labeled: bool) -> f64 {
        let floor = if labeled {
            self.labeled_floor
        } else {
            self.floor
        };
        (100.0 - excess.max(0.0) * self.slope).max(floor)
    }
}

/// Thresholds, debounces and score curves for the classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Center tolerance on |gaze.x|
    pub horizontal_threshold: f64,
    /// Center tolerance on |gaze.y|
    pub vertical_threshold: f64,
    /// Center tolerance on head tilt
    pub tilt_threshold: f64,
    /// gaze.y beyond this is a sharp downward look
    pub phone_threshold: f64,
    /// |gaze.x| beyond this is looking away
    pub extreme_horizontal_threshold: f64,
    /// |gaze.x| beyond this is a moderate deviation
    pub moderate_horizontal_threshold: f64,

    pub phone_debounce: u32,
    pub extreme_debounce: u32,
    pub moderate_debounce: u32,
    pub minor_debounce: u32,
    pub vertical_debounce: u32,
    pub tilt_debounce: u32,

    pub phone_curve: ScoreCurve,
    pub extreme_curve: ScoreCurve,
    pub moderate_curve: ScoreCurve,
    pub minor_curve: ScoreCurve,
    pub vertical_curve: ScoreCurve,
    pub tilt_curve: ScoreCurve,

    /// Stable frames needed for the large bonus
    pub long_stable_frames: u32,
    pub long_stable_bonus: f64,
    /// Stable frames needed for the small bonus
    pub short_stable_frames: u32,
    pub short_stable_bonus: f64,
    /// Distraction frames after which the sustained penalty applies
    pub sustained_distraction_frames: u32,
    pub sustained_distraction_penalty: f64,
    /// Bonus when the face is at a comfortable distance
    pub good_range_bonus: f64,

    /// Lost frames tolerated before `face_not_detected` is reported
    pub face_lost_grace_frames: u32,
    /// Per-frame score decay during the grace period
    pub face_lost_penalty: f64,
    /// Lowest score reached during the grace period
    pub face_lost_floor: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            horizontal_threshold: 0.035,
            vertical_threshold: 0.04,
            tilt_threshold: 0.05,
            phone_threshold: 0.08,
            extreme_horizontal_threshold: 0.1,
            moderate_horizontal_threshold: 0.06,

            phone_debounce: 5,
            extreme_debounce: 4,
            moderate_debounce: 8,
            minor_debounce: 15,
            vertical_debounce: 8,
            tilt_debounce: 10,

            phone_curve: ScoreCurve::new(800.0, 50.0, 20.0),
            extreme_curve: ScoreCurve::new(700.0, 45.0, 30.0),
            moderate_curve: ScoreCurve::new(500.0, 60.0, 45.0),
            minor_curve: ScoreCurve::new(400.0, 80.0, 80.0),
            vertical_curve: ScoreCurve::new(600.0, 60.0, 45.0),
            tilt_curve: ScoreCurve::new(400.0, 60.0, 60.0),

            long_stable_frames: 20,
            long_stable_bonus: 5.0,
            short_stable_frames: 10,
            short_stable_bonus: 2.0,
            sustained_distraction_frames: 20,
            sustained_distraction_penalty: 10.0,
            good_range_bonus: 2.0,

            face_lost_grace_frames: 8,
            face_lost_penalty: 5.0,
            face_lost_floor: 30.0,
        }
    }
}

/// What a rule does to the stable-frame counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StableEffect {
    Increment,
    Hold,
    Reset,
}

/// Classifier input for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierInput {
    /// Smoothed, baseline-corrected gaze
    pub gaze: GazeVector,
    pub tilt: f64,
    pub in_good_range: bool,
}

/// One row of the decision table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    Centered,
    PhoneDown,
    ExtremeHorizontal,
    ModerateHorizontal,
    MinorHorizontal,
    Vertical,
    Tilted,
    Fallback,
}

/// Evaluation order of the decision table.
pub const RULES: [Rule; 8] = [
    Rule::Centered,
    Rule::PhoneDown,
    Rule::ExtremeHorizontal,
    Rule::ModerateHorizontal,
    Rule::MinorHorizontal,
    Rule::Vertical,
    Rule::Tilted,
    Rule::Fallback,
];

impl Rule {
    pub fn matches(self, input: &ClassifierInput, cfg: &ClassifierConfig) -> bool {
        let (x, y) = (input.gaze.x.abs(), input.gaze.y);
        match self {
            Rule::Centered => {
                x <= cfg.horizontal_threshold
                    && y.abs() <= cfg.vertical_threshold
                    && input.tilt <= cfg.tilt_threshold
            }
            Rule::PhoneDown => y > cfg.phone_threshold,
            Rule::ExtremeHorizontal => x > cfg.extreme_horizontal_threshold,
            Rule::ModerateHorizontal => x > cfg.moderate_horizontal_threshold,
            Rule::MinorHorizontal => x > cfg.horizontal_threshold,
            Rule::Vertical => y.abs() > cfg.vertical_threshold,
            Rule::Tilted => input.tilt > cfg.tilt_threshold,
            Rule::Fallback => true,
        }
    }

    /// Whether the rule counts as a distraction frame.
    pub fn is_distraction(self) -> bool {
        !matches!(self, Rule::Centered | Rule::Fallback)
    }

    pub fn direction(self, input: &ClassifierInput) -> GazeDirection {
        let horizontal = if input.gaze.x > 0.0 {
            GazeDirection::Right
        } else {
            GazeDirection::Left
        };
        match self {
            Rule::Centered | Rule::Fallback => GazeDirection::Center,
            Rule::PhoneDown => GazeDirection::Down,
            Rule::ExtremeHorizontal | Rule::ModerateHorizontal | Rule::MinorHorizontal => {
                horizontal
            }
            Rule::Vertical => {
                if input.gaze.y > 0.0 {
                    GazeDirection::Down
                } else {
                    GazeDirection::Up
                }
            }
            Rule::Tilted => GazeDirection::Tilted,
        }
    }

    /// Label shown once the debounce has elapsed.
    pub fn label(self) -> Option<DistractionType> {
        match self {
            Rule::Centered | Rule::Fallback => None,
            Rule::PhoneDown => Some(DistractionType::UsingPhone),
            Rule::ExtremeHorizontal => Some(DistractionType::LookingAway),
            Rule::ModerateHorizontal | Rule::Vertical => Some(DistractionType::Distracted),
            Rule::MinorHorizontal => Some(DistractionType::Wandering),
            Rule::Tilted => Some(DistractionType::HeadTilted),
        }
    }

    /// Consecutive distraction frames that must be exceeded before the
    /// label is shown.
    pub fn debounce(self, cfg: &ClassifierConfig) -> u32 {
        match self {
            Rule::Centered | Rule::Fallback => 0,
            Rule::PhoneDown => cfg.phone_debounce,
            Rule::ExtremeHorizontal => cfg.extreme_debounce,
            Rule::ModerateHorizontal => cfg.moderate_debounce,
            Rule::MinorHorizontal => cfg.minor_debounce,
            Rule::Vertical => cfg.vertical_debounce,
            Rule::Tilted => cfg.tilt_debounce,
        }
    }

    pub fn stable_effect(self) -> StableEffect {
        match self {
            Rule::Centered | Rule::Fallback => StableEffect::Increment,
            Rule::MinorHorizontal | Rule::Tilted => StableEffect::Hold,
            Rule::PhoneDown
            | Rule::ExtremeHorizontal
            | Rule::ModerateHorizontal
            | Rule::Vertical => StableEffect::Reset,
        }
    }

    /// Score before hysteresis.
    pub fn score(self, input: &ClassifierInput, cfg: &ClassifierConfig, labeled: bool) -> f64 {
        let x = input.gaze.x.abs();
        match self {
            Rule::Centered | Rule::Fallback => 100.0,
            Rule::PhoneDown => cfg
                .phone_curve
                .score(input.gaze.y - cfg.phone_threshold, labeled),
            Rule::ExtremeHorizontal => cfg
                .extreme_curve
                .score(x - cfg.horizontal_threshold, labeled),
            Rule::ModerateHorizontal => cfg
                .moderate_curve
                .score(x - cfg.horizontal_threshold, labeled),
            Rule::MinorHorizontal => cfg
                .minor_curve
                .score(x - cfg.horizontal_threshold, labeled),
            Rule::Vertical => cfg
                .vertical_curve
                .score(input.gaze.y.abs() - cfg.vertical_threshold, labeled),
            Rule::Tilted => cfg.tilt_curve.score(input.tilt, labeled),
        }
    }
}

/// Frame-run counters that drive hysteresis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameCounters {
    pub stable_frames: u32,
    pub distraction_frames: u32,
    pub face_lost_frames: u32,
}

/// Classifier output for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    /// Matching rule; `None` for a face-lost frame
    pub rule: Option<Rule>,
    pub direction: GazeDirection,
    pub label: Option<DistractionType>,
    /// Unsmoothed score in [0, 100]
    pub raw_score: f64,
}

/// Stateful classifier owning the hysteresis counters.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
    counters: FrameCounters,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            counters: FrameCounters::default(),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn counters(&self) -> FrameCounters {
        self.counters
    }

    /// The first rule of the table matching `input`.
    pub fn select_rule(&self, input: &ClassifierInput) -> Rule {
        RULES
            .iter()
            .copied()
            .find(|rule| rule.matches(input, &self.config))
            .unwrap_or(Rule::Fallback)
    }

    /// Classify a frame with a detected face.
    pub fn classify(&mut self, input: &ClassifierInput) -> Verdict {
        let cfg = &self.config;
        let rule = self.select_rule(input);
        let counters = &mut self.counters;

        counters.face_lost_frames = 0;
        match rule.stable_effect() {
            StableEffect::Increment => counters.stable_frames += 1,
            StableEffect::Hold => {}
            StableEffect::Reset => counters.stable_frames = 0,
        }
        if rule.is_distraction() {
            counters.distraction_frames += 1;
        } else {
            counters.distraction_frames = 0;
        }

        let debounce = rule.debounce(cfg);
        let labeled = rule.is_distraction() && counters.distraction_frames > debounce;
        let label = if labeled { rule.label() } else { None };
        if labeled && counters.distraction_frames == debounce + 1 {
            tracing::debug!(rule = ?rule, label = ?label, "distraction label raised");
        }

        let mut score = rule.score(input, cfg, labeled);

        if counters.stable_frames > cfg.long_stable_frames {
            score += cfg.long_stable_bonus;
        } else if counters.stable_frames > cfg.short_stable_frames {
            score += cfg.short_stable_bonus;
        }
        if counters.distraction_frames > cfg.sustained_distraction_frames {
            score -= cfg.sustained_distraction_penalty;
        }
        if input.in_good_range {
            score += cfg.good_range_bonus;
        }

        Verdict {
            rule: Some(rule),
            direction: rule.direction(input),
            label,
            raw_score: clamp_score(score),
        }
    }

    /// Account for a frame without a detected face.
    ///
    /// `previous_score` is the last score reported to the host.
    pub fn face_lost(&mut self, previous_score: f64) -> Verdict {
        let cfg = &self.config;
        let counters = &mut self.counters;

        counters.face_lost_frames += 1;
        counters.stable_frames = 0;
        counters.distraction_frames += 1;

        let (label, raw_score) = if counters.face_lost_frames > cfg.face_lost_grace_frames {
            if counters.face_lost_frames == cfg.face_lost_grace_frames + 1 {
                tracing::info!(
                    frames = counters.face_lost_frames,
                    "face lost beyond grace period"
                );
            }
            (Some(DistractionType::FaceNotDetected), 0.0)
        } else {
            // Decay gently, but never raise a score that is already low
            let floor = cfg.face_lost_floor.min(previous_score);
            (None, (previous_score - cfg.face_lost_penalty).max(floor))
        };

        Verdict {
            rule: None,
            direction: GazeDirection::Unknown,
            label,
            raw_score: clamp_score(raw_score),
        }
    }
}

/// Clamp to [0, 100], mapping NaN to 0.
fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}
