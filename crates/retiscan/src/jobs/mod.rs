//! Background analysis jobs and the collaborators they talk to.
//!
//! A job moves a record `PENDING -> COMPLETED | FAILED`. Failure is terminal
//! and all-or-nothing: a failed record never carries a partial diagnosis.

mod collaborators;
mod fs;
mod queue;

pub use collaborators::{ArtifactStore, ImageSource, RecordStore};
pub use fs::{FsArtifactStore, FsImageSource, JsonRecordStore, MemoryRecordStore};
pub use queue::{JobHandle, JobOutcome, JobQueue};

use crate::error::{AnalysisError, ErrorKind, USER_FAILURE_MESSAGE};
use crate::pipeline::InferenceResult;

/// Record lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

/// Partial record update; `None` fields are left untouched by the store.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RecordUpdate {
    pub status: JobStatus,
    /// Diagnosis line on success, the fixed user message on failure.
    #[serde(rename = "result", default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_narrative: Option<String>,
    #[serde(
        rename = "annotated_image_url",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub overlay_locator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl RecordUpdate {
    pub fn pending() -> Self {
        Self {
            status: JobStatus::Pending,
            diagnosis: None,
            risk_narrative: None,
            overlay_locator: None,
            error_kind: None,
        }
    }

    pub fn completed(result: &InferenceResult, overlay_locator: String) -> Self {
        Self {
            status: JobStatus::Completed,
            diagnosis: Some(result.result_line()),
            risk_narrative: Some(result.risk_narrative.clone()),
            overlay_locator: Some(overlay_locator),
            error_kind: None,
        }
    }

    /// Terminal failure. `kind` is `None` when the job died without a typed error.
    pub fn failed(kind: Option<ErrorKind>) -> Self {
        Self {
            status: JobStatus::Failed,
            diagnosis: Some(USER_FAILURE_MESSAGE.to_string()),
            risk_narrative: None,
            overlay_locator: None,
            error_kind: kind,
        }
    }

    pub fn from_error(err: &AnalysisError) -> Self {
        Self::failed(Some(err.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_words_are_uppercase() {
        assert_eq!(serde_json::to_string(&JobStatus::Completed).unwrap(), "\"COMPLETED\"");
        assert_eq!(
            serde_json::from_str::<JobStatus>("\"FAILED\"").unwrap(),
            JobStatus::Failed
        );
    }

    #[test]
    fn failed_update_carries_fixed_message_only() {
        let update = RecordUpdate::from_error(&AnalysisError::MalformedImage("eof".into()));
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["status"], "FAILED");
        assert_eq!(json["result"], USER_FAILURE_MESSAGE);
        assert_eq!(json["error_kind"], "malformed_image");
        assert!(json.get("annotated_image_url").is_none());
        assert!(json.get("risk_narrative").is_none());
    }

    #[test]
    fn completed_update_uses_record_field_names() {
        let result = InferenceResult {
            diagnosis: "Nhẹ (Mild)".into(),
            risk_narrative: "Technical: HE=0 MA=30 EX+SE=0".into(),
            overlay_image: vec![1, 2, 3],
            classifier_confidence: Some(0.5),
        };
        let json = serde_json::to_value(RecordUpdate::completed(&result, "file:///x.png".into())).unwrap();
        assert_eq!(json["result"], "Nhẹ (Mild) (50.00%)");
        assert_eq!(json["annotated_image_url"], "file:///x.png");
    }
}
