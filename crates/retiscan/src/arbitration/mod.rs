//! Ensemble arbitration: lesion-area severity, classifier cross-check and
//! the risk narrative.
//!
//! Everything here is a pure function of `(areas, classifier)`. All
//! thresholds are compile-time constants.

mod narrative;
mod rules;

pub use narrative::{risk_report, RiskLine, RiskSection};
pub use rules::{
    segmentation_severity, NOISE_OVERRIDE_CONFIDENCE, NOISE_OVERRIDE_REASON,
    SUSPECTED_OVERRIDE_REASON,
};

use crate::classifier::ClassifierFinding;
use crate::grade::Severity;
use crate::lesion::LesionAreas;

/// Classifier confidence below which a graded result is flagged for review.
pub const LOW_CONFIDENCE: f32 = 0.60;

/// Final decision for one image.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EnsembleVerdict {
    /// Lesion areas the verdict was derived from.
    pub areas: LesionAreas,
    /// Tier from the severity table alone.
    pub segmentation_severity: Severity,
    /// Final score 0..=3 after the cross-check.
    pub severity_score: u8,
    pub classifier: ClassifierFinding,
    pub final_diagnosis: String,
    pub override_applied: bool,
    pub override_reason: Option<String>,
    pub risk_report: Vec<RiskLine>,
}

impl EnsembleVerdict {
    /// Final severity is 3: severe, proliferative or suspected.
    pub fn needs_referral(&self) -> bool {
        self.severity_score >= Severity::Severe.score()
    }

    /// Classifier produced a grade, but with less than 60% confidence.
    pub fn low_confidence(&self) -> bool {
        let c = self.classifier.confidence();
        c > 0.0 && c < LOW_CONFIDENCE
    }

    /// Report lines joined with newlines.
    pub fn risk_narrative(&self) -> String {
        self.risk_report
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Combine lesion areas and the classifier opinion into a verdict.
pub fn arbitrate(areas: &LesionAreas, classifier: &ClassifierFinding) -> EnsembleVerdict {
    let segmentation = segmentation_severity(areas);
    let check = rules::cross_check(segmentation, classifier);
    tracing::debug!(
        segmentation = segmentation.score(),
        score = check.score,
        overridden = check.override_reason.is_some(),
        "arbitration"
    );
    EnsembleVerdict {
        areas: *areas,
        segmentation_severity: segmentation,
        severity_score: check.score,
        classifier: *classifier,
        final_diagnosis: check.diagnosis,
        override_applied: check.override_reason.is_some(),
        override_reason: check.override_reason.map(str::to_string),
        risk_report: risk_report(check.score, areas),
    }
}
