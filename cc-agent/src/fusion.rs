//! Merging the calibrated estimate with the reasoned assessment.
//!
//! The two signals are kept side by side rather than averaged. The calibrated
//! number is preferred for display because it comes from a model trained for
//! calibration; the reasoned number always exists and carries the analysis.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::reasoning::Assessment;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Default gap at which the two signals are flagged as disagreeing.
pub const DEFAULT_DIVERGENCE_THRESHOLD: f64 = 0.25;

/// Rubric bands the reasoning model is asked to calibrate against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum CalibrationBand {
    Unlikely,
    Concerning,
    Reasonable,
    Strong,
    VeryHigh,
}

impl CalibrationBand {
    /// All bands, lowest first.
    pub const ALL: [CalibrationBand; 5] = [
        CalibrationBand::Unlikely,
        CalibrationBand::Concerning,
        CalibrationBand::Reasonable,
        CalibrationBand::Strong,
        CalibrationBand::VeryHigh,
    ];

    /// Inclusive lower and exclusive upper bound (the top band includes 1.0).
    pub fn range(&self) -> (f64, f64) {
        match self {
            Self::Unlikely => (0.0, 0.3),
            Self::Concerning => (0.3, 0.5),
            Self::Reasonable => (0.5, 0.7),
            Self::Strong => (0.7, 0.85),
            Self::VeryHigh => (0.85, 1.0),
        }
    }

    /// Rubric wording for the band.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Unlikely => "Unlikely or deeply flawed",
            Self::Concerning => "Possible but significant concerns",
            Self::Reasonable => "Reasonable but needs validation",
            Self::Strong => "Strong case with minor uncertainties",
            Self::VeryHigh => "Very high confidence (rare)",
        }
    }

    /// Band containing `confidence`. Out-of-range values fall into the
    /// nearest end band.
    pub fn for_confidence(confidence: f64) -> Self {
        Self::ALL
            .into_iter()
            .find(|band| confidence < band.range().1)
            .unwrap_or(Self::VeryHigh)
    }

    /// The rubric as prompt lines, e.g. `- 0.0-0.3: Unlikely or deeply flawed`.
    pub fn rubric() -> String {
        Self::ALL
            .iter()
            .map(|band| {
                let (low, high) = band.range();
                format!("- {}-{}: {}", fmt_bound(low), fmt_bound(high), band.description())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn fmt_bound(value: f64) -> String {
    let mut text = format!("{value:.2}");
    if text.ends_with('0') {
        text.pop();
    }
    text
}

impl fmt::Display for CalibrationBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Which signals a validation produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confidence {
    /// Forecaster unavailable; only the reasoning model's number.
    Reasoned { reasoned: f64 },
    /// Both signals.
    ReasonedAndCalibrated { reasoned: f64, calibrated: f64 },
}

impl Confidence {
    fn from_parts(reasoned: f64, calibrated: Option<f64>) -> Self {
        match calibrated {
            Some(calibrated) => Self::ReasonedAndCalibrated { reasoned, calibrated },
            None => Self::Reasoned { reasoned },
        }
    }

    pub fn reasoned(&self) -> f64 {
        match *self {
            Self::Reasoned { reasoned } | Self::ReasonedAndCalibrated { reasoned, .. } => reasoned,
        }
    }

    pub fn calibrated(&self) -> Option<f64> {
        match *self {
            Self::Reasoned { .. } => None,
            Self::ReasonedAndCalibrated { calibrated, .. } => Some(calibrated),
        }
    }

    /// Calibrated when present, otherwise reasoned.
    pub fn primary(&self) -> f64 {
        self.calibrated().unwrap_or_else(|| self.reasoned())
    }
}

/// Annotation for results whose two signals disagree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Divergence {
    /// `calibrated - reasoned`
    pub gap: f64,
    /// Band of the reasoned confidence
    pub reasoned_band: CalibrationBand,
    /// Band of the calibrated confidence
    pub calibrated_band: CalibrationBand,
}

impl Divergence {
    pub fn magnitude(&self) -> f64 {
        self.gap.abs()
    }

    /// Whether the forecaster was the more optimistic source.
    pub fn calibrated_higher(&self) -> bool {
        self.gap > 0.0
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (higher, lower) = if self.calibrated_higher() {
            ("calibrated forecast", "reasoned assessment")
        } else {
            ("reasoned assessment", "calibrated forecast")
        };
        write!(
            f,
            "{} is {:.0} points above the {}",
            higher,
            self.magnitude() * 100.0,
            lower
        )
    }
}

/// Outcome of one validation.
///
/// Serializes flat: `confidence`, `calibrated_confidence`, `reasoning`,
/// `risks`, `next_steps`, `calibration_unavailable`, `divergence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ValidationWire", try_from = "ValidationWire")]
pub struct ValidationResult {
    pub confidence: Confidence,
    pub reasoning: String,
    pub risks: Vec<String>,
    pub next_steps: Vec<String>,
    pub divergence: Option<Divergence>,
}

impl ValidationResult {
    /// The reasoning model's confidence.
    pub fn reasoned_confidence(&self) -> f64 {
        self.confidence.reasoned()
    }

    /// The forecaster's confidence, exactly as estimated.
    pub fn calibrated_confidence(&self) -> Option<f64> {
        self.confidence.calibrated()
    }

    /// Confidence to display and to drive promotion.
    pub fn primary_confidence(&self) -> f64 {
        self.confidence.primary()
    }

    /// True when the forecaster contributed nothing.
    pub fn calibration_unavailable(&self) -> bool {
        self.confidence.calibrated().is_none()
    }

    /// Rubric band of the primary confidence.
    pub fn band(&self) -> CalibrationBand {
        CalibrationBand::for_confidence(self.primary_confidence())
    }
}

#[derive(Serialize, Deserialize)]
struct ValidationWire {
    confidence: f64,
    calibrated_confidence: Option<f64>,
    reasoning: String,
    #[serde(default)]
    risks: Vec<String>,
    #[serde(default)]
    next_steps: Vec<String>,
    #[serde(default)]
    calibration_unavailable: bool,
    #[serde(default)]
    divergence: Option<Divergence>,
}

impl From<ValidationResult> for ValidationWire {
    fn from(result: ValidationResult) -> Self {
        Self {
            confidence: result.reasoned_confidence(),
            calibrated_confidence: result.calibrated_confidence(),
            calibration_unavailable: result.calibration_unavailable(),
            reasoning: result.reasoning,
            risks: result.risks,
            next_steps: result.next_steps,
            divergence: result.divergence,
        }
    }
}

impl TryFrom<ValidationWire> for ValidationResult {
    type Error = String;

    fn try_from(wire: ValidationWire) -> Result<Self, Self::Error> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(wire.confidence) || !wire.calibrated_confidence.map_or(true, in_range) {
            return Err("confidence must lie in [0, 1]".to_string());
        }
        Ok(Self {
            confidence: Confidence::from_parts(wire.confidence, wire.calibrated_confidence),
            reasoning: wire.reasoning,
            risks: wire.risks,
            next_steps: wire.next_steps,
            divergence: wire.divergence,
        })
    }
}

/// Combines an optional estimate with a reasoned assessment.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceFusion {
    divergence_threshold: f64,
}

impl Default for ConfidenceFusion {
    fn default() -> Self {
        Self {
            divergence_threshold: DEFAULT_DIVERGENCE_THRESHOLD,
        }
    }
}

impl ConfidenceFusion {
    pub fn new(divergence_threshold: f64) -> Self {
        Self {
            divergence_threshold: divergence_threshold.clamp(0.0, 1.0),
        }
    }

    pub fn divergence_threshold(&self) -> f64 {
        self.divergence_threshold
    }

    /// Merge the two signals. The estimate is carried through unchanged.
    pub fn fuse(&self, estimate: Option<f64>, assessment: Assessment) -> ValidationResult {
        let confidence = Confidence::from_parts(assessment.confidence, estimate);

        let divergence = match confidence {
            Confidence::ReasonedAndCalibrated { reasoned, calibrated }
                if (calibrated - reasoned).abs() >= self.divergence_threshold =>
            {
                Some(Divergence {
                    gap: calibrated - reasoned,
                    reasoned_band: CalibrationBand::for_confidence(reasoned),
                    calibrated_band: CalibrationBand::for_confidence(calibrated),
                })
            }
            _ => None,
        };

        ValidationResult {
            confidence,
            reasoning: assessment.reasoning,
            risks: assessment.risks,
            next_steps: assessment.next_steps,
            divergence,
        }
    }
}
