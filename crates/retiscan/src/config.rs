use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{AnalysisError, AnalysisResult};
use crate::preprocess::ModelFamily;

/// Contrast-limited adaptive histogram equalization parameters for the vessel adapter.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClaheConfig {
    /// Histogram clip limit, relative to a uniform distribution.
    pub clip_limit: f32,
    /// Number of tiles along each image axis.
    pub tile_grid: u32,
}

impl Default for ClaheConfig {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tile_grid: 8,
        }
    }
}

/// Per-channel normalization expected by the classifier backbone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelNormalization {
    /// `(x / 255 - mean) / std` with ImageNet statistics.
    #[default]
    Imagenet,
    /// `x / 255`.
    UnitRange,
}

/// Tensor geometry and filter settings for the three preprocessing families.
///
/// The sizes pin the model input shapes: a registry built from this config
/// rejects tensors of any other shape.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Square input side of the lesion segmentation models (also the overlay size).
    pub segmentation_size: u32,
    /// Square input side of the vessel segmentation model.
    pub vessel_size: u32,
    /// Square input side of the severity classifier.
    pub classifier_size: u32,
    /// Local contrast enhancement of the vessel green channel.
    pub clahe: ClaheConfig,
    /// Gaussian sigma of the unsharp mask applied before classification.
    pub unsharp_sigma: f32,
    /// Classifier channel normalization.
    pub classifier_normalization: ChannelNormalization,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            segmentation_size: 256,
            vessel_size: 512,
            classifier_size: 224,
            clahe: ClaheConfig::default(),
            unsharp_sigma: 10.0,
            classifier_normalization: ChannelNormalization::Imagenet,
        }
    }
}

impl PreprocessConfig {
    /// NHWC input shape for a model family.
    pub fn input_shape(&self, family: ModelFamily) -> [usize; 4] {
        match family {
            ModelFamily::Segmentation => {
                let s = self.segmentation_size as usize;
                [1, s, s, 3]
            }
            ModelFamily::Vessel => {
                let s = self.vessel_size as usize;
                [1, s, s, 1]
            }
            ModelFamily::Classifier => {
                let s = self.classifier_size as usize;
                [1, s, s, 3]
            }
        }
    }

    fn validate(&self) -> AnalysisResult<()> {
        if self.segmentation_size == 0 || self.vessel_size == 0 || self.classifier_size == 0 {
            return Err(AnalysisError::InvalidConfig(
                "preprocess sizes must be non-zero".into(),
            ));
        }
        if self.clahe.tile_grid == 0 || self.clahe.tile_grid > self.vessel_size {
            return Err(AnalysisError::InvalidConfig(format!(
                "clahe.tile_grid must be in 1..={}",
                self.vessel_size
            )));
        }
        if !(self.clahe.clip_limit.is_finite() && self.clahe.clip_limit > 0.0) {
            return Err(AnalysisError::InvalidConfig(
                "clahe.clip_limit must be positive".into(),
            ));
        }
        if !(self.unsharp_sigma.is_finite() && self.unsharp_sigma > 0.0) {
            return Err(AnalysisError::InvalidConfig(
                "unsharp_sigma must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Top-level analyzer configuration.
///
/// Clinical constants (lesion thresholds, severity table, override rule,
/// narrative cut-offs) are deliberately absent: they are fixed in code.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Model name (`HE`, `MA`, `EX`, `SE`, `OD`, `Vessels`, `CLASSIFIER`) to artifact path.
    pub models: BTreeMap<String, PathBuf>,
    /// Base directory for relative artifact paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models_dir: Option<PathBuf>,
    /// Preprocessing geometry and filters.
    pub preprocess: PreprocessConfig,
    /// Number of background workers used by the job queue.
    pub workers: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            models: BTreeMap::new(),
            models_dir: None,
            preprocess: PreprocessConfig::default(),
            workers: 2,
        }
    }
}

impl AnalyzerConfig {
    /// Conventional artifact layout `<dir>/<name>.onnx` for every model.
    pub fn with_models_dir(dir: impl Into<PathBuf>) -> Self {
        let models = crate::registry::ModelId::ALL
            .iter()
            .map(|id| (id.as_str().to_string(), PathBuf::from(format!("{}.onnx", id.as_str()))))
            .collect();
        Self {
            models,
            models_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Load and validate a JSON configuration file.
    pub fn from_json_file(path: &Path) -> AnalysisResult<Self> {
        let data = std::fs::read_to_string(path).map_err(|err| {
            AnalysisError::InvalidConfig(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_json_str(&data)
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json_str(data: &str) -> AnalysisResult<Self> {
        let cfg: Self = serde_json::from_str(data)
            .map_err(|err| AnalysisError::InvalidConfig(err.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check value ranges; called by the loaders and by `Analyzer::from_config`.
    pub fn validate(&self) -> AnalysisResult<()> {
        if self.workers == 0 {
            return Err(AnalysisError::InvalidConfig("workers must be >= 1".into()));
        }
        self.preprocess.validate()
    }

    /// Artifact path with `models_dir` applied to relative entries.
    pub fn resolve_artifact(&self, path: &Path) -> PathBuf {
        match &self.models_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}
