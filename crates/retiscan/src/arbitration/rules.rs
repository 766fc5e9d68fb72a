//! Lesion-area severity table and the classifier cross-check.

use crate::classifier::ClassifierFinding;
use crate::grade::Severity;
use crate::lesion::LesionAreas;

const SEVERE_HE: u64 = 800;
const SEVERE_SE: u64 = 200;
const MODERATE_HE: u64 = 80;
const MODERATE_EX: u64 = 150;
const MILD_MA: u64 = 20;
const MILD_HE: u64 = 20;

/// Classifier "Normal" confidence above which a mild lesion map is dismissed.
pub const NOISE_OVERRIDE_CONFIDENCE: f32 = 0.85;

pub const NOISE_OVERRIDE_REASON: &str = "segmentation signal treated as noise";
pub const SUSPECTED_OVERRIDE_REASON: &str =
    "global signal without confirmed lesion map — flag for manual review";

/// Severity tier from lesion areas. Rows are checked top-down; first match wins.
pub fn segmentation_severity(areas: &LesionAreas) -> Severity {
    if areas.he > SEVERE_HE || areas.se > SEVERE_SE {
        Severity::Severe
    } else if areas.he > MODERATE_HE || areas.ex > MODERATE_EX {
        Severity::Moderate
    } else if areas.ma > MILD_MA || areas.he > MILD_HE {
        Severity::Mild
    } else {
        Severity::Normal
    }
}

/// Outcome of cross-checking segmentation against the classifier.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CrossCheck {
    pub score: u8,
    pub diagnosis: String,
    pub override_reason: Option<&'static str>,
}

pub(crate) fn cross_check(segmentation: Severity, classifier: &ClassifierFinding) -> CrossCheck {
    if classifier.says_normal()
        && classifier.confidence() > NOISE_OVERRIDE_CONFIDENCE
        && segmentation == Severity::Mild
    {
        return CrossCheck {
            score: Severity::Normal.score(),
            diagnosis: Severity::Normal.label().to_string(),
            override_reason: Some(NOISE_OVERRIDE_REASON),
        };
    }
    if classifier.says_severe() && segmentation == Severity::Normal {
        return CrossCheck {
            score: Severity::Severe.score(),
            diagnosis: format!("Suspected {}", classifier.label()),
            override_reason: Some(SUSPECTED_OVERRIDE_REASON),
        };
    }
    CrossCheck {
        score: segmentation.score(),
        diagnosis: segmentation.label().to_string(),
        override_reason: None,
    }
}
