//! Whole-image severity classifier runner.

use image::DynamicImage;

use crate::config::PreprocessConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::grade::DrGrade;
use crate::preprocess::{self, ModelFamily};
use crate::registry::{ModelId, ModelRegistry};

/// Classifier opinion, or the sentinel for "no classifier loaded".
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClassifierFinding {
    Graded { grade: DrGrade, confidence: f32 },
    Undetermined,
}

impl ClassifierFinding {
    pub fn grade(&self) -> Option<DrGrade> {
        match self {
            Self::Graded { grade, .. } => Some(*grade),
            Self::Undetermined => None,
        }
    }

    /// Top-class probability; `0.0` when undetermined.
    pub fn confidence(&self) -> f32 {
        match self {
            Self::Graded { confidence, .. } => *confidence,
            Self::Undetermined => 0.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Graded { grade, .. } => grade.label(),
            Self::Undetermined => "Undetermined",
        }
    }

    /// Classifier says Normal.
    pub fn says_normal(&self) -> bool {
        self.grade().is_some_and(DrGrade::is_normal)
    }

    /// Classifier says Severe or Proliferative.
    pub fn says_severe(&self) -> bool {
        self.grade().is_some_and(DrGrade::is_severe)
    }
}

/// Pick the class with the highest probability. Ties go to the lower index.
pub fn argmax_grade(probs: &[f32]) -> Option<ClassifierFinding> {
    if probs.len() != DrGrade::ALL.len() {
        return None;
    }
    let mut best = 0;
    for (i, &p) in probs.iter().enumerate().skip(1) {
        if p > probs[best] {
            best = i;
        }
    }
    let grade = DrGrade::from_index(best)?;
    let confidence = probs[best];
    let confidence = if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    };
    Some(ClassifierFinding::Graded { grade, confidence })
}

/// One classifier forward pass, or `Undetermined` when the model is absent.
pub fn run_classifier(
    registry: &ModelRegistry,
    image: &DynamicImage,
    cfg: &PreprocessConfig,
) -> AnalysisResult<ClassifierFinding> {
    if !registry.has(ModelId::Classifier) {
        tracing::debug!("classifier not loaded; verdict relies on segmentation only");
        return Ok(ClassifierFinding::Undetermined);
    }
    let tensor = preprocess::prepare(image, ModelFamily::Classifier, cfg);
    let raw = registry.infer(ModelId::Classifier, tensor)?;
    let finding = argmax_grade(&raw.data).ok_or_else(|| {
        AnalysisError::inference(
            ModelId::Classifier,
            format!(
                "expected {} class probabilities, got shape {:?}",
                DrGrade::ALL.len(),
                raw.shape
            ),
        )
    })?;
    tracing::debug!(
        label = finding.label(),
        confidence = finding.confidence(),
        "classifier result"
    );
    Ok(finding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{RawOutput, ScoringModel};
    use crate::test_utils::{small_preprocess, synthetic_fundus, FnModel};
    use approx::assert_abs_diff_eq;

    fn registry_with_probs(probs: Vec<f32>) -> ModelRegistry {
        let model: Box<dyn ScoringModel> =
            Box::new(FnModel::new(move |_| Ok(RawOutput::new(vec![1, probs.len()], probs.clone()))));
        ModelRegistry::from_models(&small_preprocess(), [(ModelId::Classifier, model)])
    }

    #[test]
    fn argmax_picks_top_class() {
        let f = argmax_grade(&[0.05, 0.1, 0.6, 0.2, 0.05]).unwrap();
        assert_eq!(f.grade(), Some(DrGrade::Moderate));
        assert_abs_diff_eq!(f.confidence(), 0.6);
    }

    #[test]
    fn argmax_ties_go_to_first() {
        let f = argmax_grade(&[0.4, 0.4, 0.1, 0.05, 0.05]).unwrap();
        assert_eq!(f.grade(), Some(DrGrade::NoDr));
    }

    #[test]
    fn wrong_class_count_is_rejected() {
        assert!(argmax_grade(&[0.5, 0.5]).is_none());
    }

    #[test]
    fn missing_classifier_is_undetermined() {
        let pre = small_preprocess();
        let registry = ModelRegistry::from_models(&pre, Vec::new());
        let f = run_classifier(&registry, &synthetic_fundus(32, 32), &pre).unwrap();
        assert_eq!(f, ClassifierFinding::Undetermined);
        assert_eq!(f.confidence(), 0.0);
        assert!(!f.says_normal() && !f.says_severe());
    }

    #[test]
    fn run_classifier_reads_model_output() {
        let registry = registry_with_probs(vec![0.0, 0.0, 0.1, 0.2, 0.7]);
        let f = run_classifier(&registry, &synthetic_fundus(32, 32), &small_preprocess()).unwrap();
        assert_eq!(f.grade(), Some(DrGrade::Proliferative));
        assert!(f.says_severe());
        assert_eq!(f.label(), "Tăng sinh (Proliferative)");
    }

    #[test]
    fn malformed_output_is_inference_error() {
        let registry = registry_with_probs(vec![1.0; 3]);
        let err = run_classifier(&registry, &synthetic_fundus(32, 32), &small_preprocess()).unwrap_err();
        assert!(matches!(err, AnalysisError::Inference { model: ModelId::Classifier, .. }));
    }
}
