//! High-level analysis API.
//!
//! [`Analyzer`] is the primary entry point. It owns the shared, read-only
//! [`ModelRegistry`] and the [`AnalyzerConfig`] it was built from. Create
//! once, analyze many images, clone cheaply across threads.

use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;

use crate::config::AnalyzerConfig;
use crate::error::AnalysisResult;
use crate::pipeline::{self, Analysis, InferenceResult};
use crate::registry::ModelRegistry;

/// Primary analysis interface.
///
/// # Examples
///
/// ```no_run
/// use retiscan::{Analyzer, AnalyzerConfig};
///
/// let analyzer = Analyzer::from_config(AnalyzerConfig::with_models_dir("models")).unwrap();
/// let bytes = std::fs::read("fundus.jpg").unwrap();
/// let result = analyzer.infer(&bytes).unwrap();
/// println!("{}", result.result_line());
/// ```
#[derive(Debug, Clone)]
pub struct Analyzer {
    registry: Arc<ModelRegistry>,
    config: AnalyzerConfig,
}

impl Analyzer {
    /// Wrap an already-built registry after validating `config`.
    pub fn new(registry: ModelRegistry, config: AnalyzerConfig) -> AnalysisResult<Self> {
        config.validate()?;
        Ok(Self::assemble(registry, config))
    }

    fn assemble(registry: ModelRegistry, config: AnalyzerConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
        }
    }

    /// Validate `config` and load every configured ONNX artifact.
    ///
    /// Individual load failures only shrink the registry; the analyzer is
    /// still returned.
    pub fn from_config(config: AnalyzerConfig) -> AnalysisResult<Self> {
        config.validate()?;
        let registry = ModelRegistry::load(&config);
        Ok(Self::assemble(registry, config))
    }

    /// Load a JSON config file, then [`Analyzer::from_config`].
    pub fn from_json_file(path: &Path) -> AnalysisResult<Self> {
        Self::from_config(AnalyzerConfig::from_json_file(path)?)
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub(crate) fn shared_registry(&self) -> Arc<ModelRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze encoded image bytes.
    pub fn analyze(&self, image_bytes: &[u8]) -> AnalysisResult<Analysis> {
        pipeline::analyze_bytes(&self.registry, &self.config.preprocess, image_bytes)
    }

    /// Analyze an already-decoded image.
    pub fn analyze_image(&self, image: &DynamicImage) -> AnalysisResult<Analysis> {
        pipeline::analyze_image(&self.registry, &self.config.preprocess, image)
    }

    /// [`Analyzer::analyze`] reduced to the record-facing result.
    pub fn infer(&self, image_bytes: &[u8]) -> AnalysisResult<InferenceResult> {
        self.analyze(image_bytes).map(InferenceResult::from)
    }
}
