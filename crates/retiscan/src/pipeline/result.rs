use crate::arbitration::EnsembleVerdict;
use crate::lesion::LesionType;
use crate::segmentation::SegmentationOutput;

/// Per-lesion summary kept after the masks are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LesionSummary {
    pub lesion: LesionType,
    pub area: u64,
    /// Connected components before denoising.
    pub components: usize,
    /// Components removed as noise.
    pub removed: usize,
}

/// Full analysis of a single image.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Analysis {
    pub verdict: EnsembleVerdict,
    /// Lesions that were segmented, in run order.
    pub lesions: Vec<LesionSummary>,
    /// Lesions whose model was unavailable.
    pub skipped: Vec<LesionType>,
    /// Source image dimensions `[width, height]`.
    pub image_size: [u32; 2],
    /// PNG-encoded overlay.
    #[serde(skip)]
    pub overlay_png: Vec<u8>,
}

impl Analysis {
    pub(crate) fn new(
        verdict: EnsembleVerdict,
        segmentation: &SegmentationOutput,
        image_size: [u32; 2],
        overlay_png: Vec<u8>,
    ) -> Self {
        let lesions = segmentation
            .findings
            .iter()
            .map(|f| LesionSummary {
                lesion: f.lesion,
                area: f.area,
                components: f.denoise.components,
                removed: f.denoise.removed,
            })
            .collect();
        Self {
            verdict,
            lesions,
            skipped: segmentation.skipped.clone(),
            image_size,
            overlay_png,
        }
    }
}

/// The record-facing outcome of a successful invocation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InferenceResult {
    pub diagnosis: String,
    pub risk_narrative: String,
    /// PNG-encoded overlay.
    #[serde(skip)]
    pub overlay_image: Vec<u8>,
    /// Classifier top-class probability, when a classifier ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifier_confidence: Option<f32>,
}

impl InferenceResult {
    /// `"<diagnosis> (xx.xx%)"`, or the bare diagnosis without a classifier.
    pub fn result_line(&self) -> String {
        match self.classifier_confidence {
            Some(c) => format!("{} ({:.2}%)", self.diagnosis, c * 100.0),
            None => self.diagnosis.clone(),
        }
    }
}

impl From<Analysis> for InferenceResult {
    fn from(analysis: Analysis) -> Self {
        let verdict = analysis.verdict;
        let classifier_confidence = verdict.classifier.grade().map(|_| verdict.classifier.confidence());
        Self {
            risk_narrative: verdict.risk_narrative(),
            diagnosis: verdict.final_diagnosis,
            overlay_image: analysis.overlay_png,
            classifier_confidence,
        }
    }
}
