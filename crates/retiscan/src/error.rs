//! Error taxonomy for one analysis invocation.
//!
//! `ModelUnavailable` is the only recoverable variant: the segmentation stage
//! skips the missing ensemble member and carries on. Everything else ends the
//! invocation and is reported to the record store as a terminal failure.

use crate::registry::ModelId;

/// Fixed message shown to the end user whenever an invocation fails.
pub const USER_FAILURE_MESSAGE: &str = "analysis failed, please retry with another image";

/// Result alias used throughout the crate.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Everything that can go wrong between receiving an image locator and
/// persisting the finished record.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// One ensemble member is not loaded.
    #[error("model {0} is not available")]
    ModelUnavailable(ModelId),

    /// The registry holds no model at all; nothing can be computed.
    #[error("no model could be loaded; analysis aborted")]
    AllModelsUnavailable,

    /// Input bytes could not be decoded as a raster image.
    #[error("malformed image: {0}")]
    MalformedImage(String),

    /// A model artifact failed to load. Logged by the registry, never
    /// surfaced from `analyze`.
    #[error("failed to load model {model} from {path}: {reason}")]
    ModelLoad {
        model: ModelId,
        path: String,
        reason: String,
    },

    /// A model failed at run time or produced an output of unexpected shape.
    #[error("inference failed on {model}: {reason}")]
    Inference { model: ModelId, reason: String },

    /// Static configuration is inconsistent (bad config file, tensor shape
    /// pinned to the wrong family).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The overlay could not be encoded for storage.
    #[error("failed to encode overlay: {0}")]
    Encode(String),

    /// The image source could not deliver bytes for a locator.
    #[error("failed to fetch image '{locator}': {reason}")]
    Fetch { locator: String, reason: String },

    /// The artifact store rejected the overlay upload.
    #[error("failed to store artifact '{tag}': {reason}")]
    Store { tag: String, reason: String },

    /// The record store rejected an update.
    #[error("failed to persist record '{record_id}': {reason}")]
    Persist { record_id: String, reason: String },
}

/// Stable machine-readable error classification stored alongside failed records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ModelUnavailable,
    AllModelsUnavailable,
    MalformedImage,
    ModelLoad,
    Inference,
    InvalidConfig,
    Encode,
    Fetch,
    Store,
    Persist,
}

impl AnalysisError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            Self::AllModelsUnavailable => ErrorKind::AllModelsUnavailable,
            Self::MalformedImage(_) => ErrorKind::MalformedImage,
            Self::ModelLoad { .. } => ErrorKind::ModelLoad,
            Self::Inference { .. } => ErrorKind::Inference,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Fetch { .. } => ErrorKind::Fetch,
            Self::Store { .. } => ErrorKind::Store,
            Self::Persist { .. } => ErrorKind::Persist,
        }
    }

    /// `true` when the pipeline may continue without the failing member.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ModelUnavailable(_))
    }

    /// The message end users see for any failed invocation.
    pub fn user_message(&self) -> &'static str {
        USER_FAILURE_MESSAGE
    }

    pub(crate) fn inference(model: ModelId, reason: impl Into<String>) -> Self {
        Self::Inference {
            model,
            reason: reason.into(),
        }
    }
}

impl From<image::ImageError> for AnalysisError {
    fn from(err: image::ImageError) -> Self {
        Self::MalformedImage(err.to_string())
    }
}
