//! Seams to the outside world. Implementations must be safe to call from
//! several workers at once.

use super::RecordUpdate;
use crate::error::AnalysisResult;

/// Resolves an image locator to encoded bytes. Errors are `AnalysisError::Fetch`.
pub trait ImageSource: Send + Sync {
    fn fetch(&self, locator: &str) -> AnalysisResult<Vec<u8>>;
}

/// Publishes an encoded artifact and returns its public locator.
/// Errors are `AnalysisError::Store`.
pub trait ArtifactStore: Send + Sync {
    fn store(&self, tag: &str, png: &[u8]) -> AnalysisResult<String>;
}

/// Applies a partial update to one record. Errors are `AnalysisError::Persist`.
pub trait RecordStore: Send + Sync {
    fn update(&self, record_id: &str, update: &RecordUpdate) -> AnalysisResult<()>;
}
