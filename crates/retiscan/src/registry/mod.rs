//! Immutable registry of the pre-trained scoring models.
//!
//! A registry is built once from configuration and shared read-only by every
//! invocation. Artifacts that fail to load are logged and left out; the
//! registry never retries or swaps a model afterwards.

mod onnx;

pub use onnx::OnnxModel;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::{AnalyzerConfig, PreprocessConfig};
use crate::error::{AnalysisError, AnalysisResult};
use crate::preprocess::{ModelFamily, PreprocessedTensor};

/// Name of one ensemble member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum ModelId {
    #[serde(rename = "HE")]
    He,
    #[serde(rename = "MA")]
    Ma,
    #[serde(rename = "EX")]
    Ex,
    #[serde(rename = "SE")]
    Se,
    #[serde(rename = "OD")]
    Od,
    Vessels,
    #[serde(rename = "CLASSIFIER")]
    Classifier,
}

impl ModelId {
    pub const ALL: [ModelId; 7] = [
        ModelId::He,
        ModelId::Ma,
        ModelId::Ex,
        ModelId::Se,
        ModelId::Od,
        ModelId::Vessels,
        ModelId::Classifier,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ModelId::He => "HE",
            ModelId::Ma => "MA",
            ModelId::Ex => "EX",
            ModelId::Se => "SE",
            ModelId::Od => "OD",
            ModelId::Vessels => "Vessels",
            ModelId::Classifier => "CLASSIFIER",
        }
    }

    /// Preprocessing family whose tensors this model consumes.
    pub const fn family(self) -> ModelFamily {
        match self {
            ModelId::Vessels => ModelFamily::Vessel,
            ModelId::Classifier => ModelFamily::Classifier,
            _ => ModelFamily::Segmentation,
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                format!("unknown model '{s}' (expected HE, MA, EX, SE, OD, Vessels or CLASSIFIER)")
            })
    }
}

/// Raw model output: a flat `f32` buffer and its shape.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOutput {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl RawOutput {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    /// Spatial `(height, width)` after dropping unit dimensions.
    pub fn spatial_dims(&self) -> Option<(usize, usize)> {
        let dims: Vec<usize> = self.shape.iter().copied().filter(|&d| d != 1).collect();
        match dims.as_slice() {
            [h, w] => Some((*h, *w)),
            // A 1×1 map degenerates to no non-unit dimension at all.
            [] if self.data.len() == 1 => Some((1, 1)),
            _ => None,
        }
    }
}

/// A pre-trained scoring function, safe for concurrent read-only use.
pub trait ScoringModel: Send + Sync {
    fn run(&self, input: &PreprocessedTensor) -> AnalysisResult<RawOutput>;
}

/// Static description of one configured ensemble member.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ModelSpec {
    pub name: ModelId,
    pub artifact_path: PathBuf,
    pub loaded: bool,
    /// NHWC input shape the model was pinned to.
    pub input_shape: [usize; 4],
}

struct Member {
    input_shape: [usize; 4],
    model: Box<dyn ScoringModel>,
}

/// Read-only set of loaded models plus the specs of every configured entry.
pub struct ModelRegistry {
    specs: Vec<ModelSpec>,
    members: BTreeMap<ModelId, Member>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("specs", &self.specs)
            .finish()
    }
}

impl ModelRegistry {
    /// Load every ONNX artifact named in `config.models`.
    pub fn load(config: &AnalyzerConfig) -> Self {
        Self::load_with(config, |id, path, shape| {
            OnnxModel::load(id, path, shape).map(|m| Box::new(m) as Box<dyn ScoringModel>)
        })
    }

    /// Load with a caller-supplied loader. Failures are logged and the entry
    /// is recorded with `loaded = false`.
    pub fn load_with<F>(config: &AnalyzerConfig, mut loader: F) -> Self
    where
        F: FnMut(ModelId, &Path, [usize; 4]) -> AnalysisResult<Box<dyn ScoringModel>>,
    {
        let mut specs = Vec::new();
        let mut members = BTreeMap::new();
        for (name, raw_path) in &config.models {
            let id = match ModelId::from_str(name) {
                Ok(id) => id,
                Err(reason) => {
                    tracing::warn!(name = %name, %reason, "ignoring unknown model entry");
                    continue;
                }
            };
            if specs.iter().any(|spec: &ModelSpec| spec.name == id) {
                tracing::warn!(name = %name, model = %id, "ignoring duplicate model entry");
                continue;
            }
            let path = config.resolve_artifact(raw_path);
            let input_shape = config.preprocess.input_shape(id.family());
            let loaded = match loader(id, &path, input_shape) {
                Ok(model) => {
                    tracing::info!(model = %id, path = %path.display(), "model loaded");
                    members.insert(id, Member { input_shape, model });
                    true
                }
                Err(err) => {
                    tracing::warn!(model = %id, path = %path.display(), error = %err, "model unavailable");
                    false
                }
            };
            specs.push(ModelSpec {
                name: id,
                artifact_path: path,
                loaded,
                input_shape,
            });
        }
        tracing::info!(
            loaded = members.len(),
            configured = specs.len(),
            "model registry ready"
        );
        Self { specs, members }
    }

    /// Build a registry from in-memory models pinned to `preprocess` shapes.
    pub fn from_models<I>(preprocess: &PreprocessConfig, models: I) -> Self
    where
        I: IntoIterator<Item = (ModelId, Box<dyn ScoringModel>)>,
    {
        let mut specs = Vec::new();
        let mut members = BTreeMap::new();
        for (id, model) in models {
            let input_shape = preprocess.input_shape(id.family());
            specs.push(ModelSpec {
                name: id,
                artifact_path: PathBuf::from(format!("<memory:{id}>")),
                loaded: true,
                input_shape,
            });
            members.insert(id, Member { input_shape, model });
        }
        Self { specs, members }
    }

    /// A registry with no models; every analysis fails with `AllModelsUnavailable`.
    pub fn empty() -> Self {
        Self {
            specs: Vec::new(),
            members: BTreeMap::new(),
        }
    }

    pub fn has(&self, id: ModelId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Loaded model ids, in id order.
    pub fn available(&self) -> Vec<ModelId> {
        self.members.keys().copied().collect()
    }

    /// Every configured entry, loaded or not, in configuration order.
    pub fn specs(&self) -> &[ModelSpec] {
        &self.specs
    }

    /// Run one model. The tensor is consumed by the call.
    ///
    /// A tensor prepared for another family or with a different shape is a
    /// configuration error, not a data error.
    pub fn infer(&self, id: ModelId, tensor: PreprocessedTensor) -> AnalysisResult<RawOutput> {
        let member = self
            .members
            .get(&id)
            .ok_or(AnalysisError::ModelUnavailable(id))?;
        if tensor.family() != id.family() || tensor.shape() != member.input_shape {
            return Err(AnalysisError::InvalidConfig(format!(
                "model {id} expects {:?} {:?} input, got {:?} {:?}",
                id.family(),
                member.input_shape,
                tensor.family(),
                tensor.shape()
            )));
        }
        member.model.run(&tensor)
    }
}
