//! retiscan: diabetic retinopathy triage for colour fundus photographs.
//!
//! An ensemble of pre-trained models looks at one image and the crate turns
//! their outputs into a graded diagnosis, a risk narrative and a lesion
//! overlay. The pipeline stages are:
//!
//! 1. **Preprocess** – per-family tensors (lesion segmentation, vessel
//!    segmentation with CLAHE, classifier with unsharp masking).
//! 2. **Segmentation** – per-lesion binarization, connected-component
//!    denoising and area counting; missing models are skipped.
//! 3. **Classifier** – five-class global severity grade.
//! 4. **Arbitration** – lesion-area severity table, classifier cross-check
//!    and the risk narrative.
//! 5. **Overlay** – lesion masks blended over the resized original.
//!
//! # Public API
//! - [`Analyzer`] as the primary entry point, built from [`AnalyzerConfig`]
//! - [`ModelRegistry`] and the [`ScoringModel`] trait for custom backends
//! - [`JobQueue`] with the [`ImageSource`], [`ArtifactStore`] and
//!   [`RecordStore`] collaborators for background processing
//! - [`arbitrate`] for evaluating the decision rules on their own

mod api;
pub mod arbitration;
mod classifier;
mod config;
mod error;
mod grade;
pub mod jobs;
mod lesion;
mod overlay;
mod pipeline;
pub mod preprocess;
pub mod registry;
pub mod segmentation;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::Analyzer;
pub use arbitration::{arbitrate, EnsembleVerdict, RiskLine, RiskSection};
pub use classifier::{argmax_grade, run_classifier, ClassifierFinding};
pub use config::{AnalyzerConfig, ChannelNormalization, ClaheConfig, PreprocessConfig};
pub use error::{AnalysisError, AnalysisResult, ErrorKind, USER_FAILURE_MESSAGE};
pub use grade::{DrGrade, Severity};
pub use jobs::{
    ArtifactStore, FsArtifactStore, FsImageSource, ImageSource, JobHandle, JobOutcome, JobQueue,
    JobStatus, JsonRecordStore, MemoryRecordStore, RecordStore, RecordUpdate,
};
pub use lesion::{LesionAreas, LesionParams, LesionType};
pub use overlay::{compose_overlay, encode_png};
pub use pipeline::{Analysis, InferenceResult, LesionSummary};
pub use registry::{ModelId, ModelRegistry, ModelSpec, OnnxModel, RawOutput, ScoringModel};
pub use segmentation::{LesionFinding, SegmentationOutput};
