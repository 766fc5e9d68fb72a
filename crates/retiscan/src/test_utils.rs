//! Shared fixtures for unit tests: synthetic fundus images, fake models and
//! in-memory collaborators.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Mutex;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::api::Analyzer;
use crate::config::{AnalyzerConfig, PreprocessConfig};
use crate::error::{AnalysisError, AnalysisResult};
use crate::jobs::{ArtifactStore, ImageSource};
use crate::preprocess::PreprocessedTensor;
use crate::registry::{ModelId, ModelRegistry, RawOutput, ScoringModel};

/// Render a dark background with a bright orange disc, a paler optic disc
/// and a few dark vessel-like lines.
pub(crate) fn synthetic_fundus(w: u32, h: u32) -> DynamicImage {
    let cx = w as f32 / 2.0;
    let cy = h as f32 / 2.0;
    let r = cx.min(cy) * 0.9;
    let od = (cx + r * 0.45, cy);
    let img = RgbImage::from_fn(w, h, |x, y| {
        let (fx, fy) = (x as f32, y as f32);
        let d = ((fx - cx).powi(2) + (fy - cy).powi(2)).sqrt();
        if d > r {
            return Rgb([4, 2, 2]);
        }
        let d_od = ((fx - od.0).powi(2) + (fy - od.1).powi(2)).sqrt();
        if d_od < r * 0.12 {
            return Rgb([250, 220, 160]);
        }
        if (fy - cy).abs() < 1.0 || ((fx - cx) - (fy - cy)).abs() < 1.0 {
            return Rgb([120, 30, 20]);
        }
        let shade = 1.0 - 0.4 * d / r;
        Rgb([(220.0 * shade) as u8, (110.0 * shade) as u8, (50.0 * shade) as u8])
    });
    DynamicImage::ImageRgb8(img)
}

pub(crate) fn encode_png(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Every family at 16x16 keeps tests fast.
pub(crate) fn small_preprocess() -> PreprocessConfig {
    PreprocessConfig {
        segmentation_size: 16,
        vessel_size: 16,
        classifier_size: 16,
        unsharp_sigma: 1.0,
        ..PreprocessConfig::default()
    }
}

pub(crate) fn boxed<M: ScoringModel + 'static>(model: M) -> Box<dyn ScoringModel> {
    Box::new(model)
}

/// Returns the same output regardless of input.
pub(crate) struct ConstantModel {
    shape: Vec<usize>,
    value: f32,
}

impl ConstantModel {
    pub(crate) fn new(shape: Vec<usize>, value: f32) -> Self {
        Self { shape, value }
    }
}

impl ScoringModel for ConstantModel {
    fn run(&self, _input: &PreprocessedTensor) -> AnalysisResult<RawOutput> {
        let n = self.shape.iter().product();
        Ok(RawOutput::new(self.shape.clone(), vec![self.value; n]))
    }
}

type ModelFn = dyn Fn(&PreprocessedTensor) -> AnalysisResult<RawOutput> + Send + Sync;

/// Closure-backed model.
pub(crate) struct FnModel(Box<ModelFn>);

impl FnModel {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: Fn(&PreprocessedTensor) -> AnalysisResult<RawOutput> + Send + Sync + 'static,
    {
        Self(Box::new(f))
    }
}

impl ScoringModel for FnModel {
    fn run(&self, input: &PreprocessedTensor) -> AnalysisResult<RawOutput> {
        (self.0)(input)
    }
}

/// Always fails at run time.
pub(crate) struct FailingModel;

impl ScoringModel for FailingModel {
    fn run(&self, _input: &PreprocessedTensor) -> AnalysisResult<RawOutput> {
        Err(AnalysisError::Inference {
            model: ModelId::Ex,
            reason: "runtime exploded".into(),
        })
    }
}

/// Panics at run time.
pub(crate) struct PanickingModel;

impl ScoringModel for PanickingModel {
    fn run(&self, _input: &PreprocessedTensor) -> AnalysisResult<RawOutput> {
        panic!("model crashed")
    }
}

/// `size`x`size` probability map with a `blob`x`blob` square at `value` in the top-left corner.
pub(crate) fn blob_map_output(size: usize, blob: usize, value: f32) -> FnModel {
    FnModel::new(move |_| {
        let data = (0..size * size)
            .map(|i| {
                let (y, x) = (i / size, i % size);
                if x < blob && y < blob {
                    value
                } else {
                    0.0
                }
            })
            .collect();
        Ok(RawOutput::new(vec![1, size, size, 1], data))
    })
}

/// Classifier returning fixed class probabilities.
pub(crate) fn probs_model(probs: [f32; 5]) -> Box<dyn ScoringModel> {
    Box::new(FnModel::new(move |_| Ok(RawOutput::new(vec![1, 5], probs.to_vec()))))
}

/// Analyzer over an in-memory registry at [`small_preprocess`] geometry.
pub(crate) fn analyzer_with<I>(models: I) -> Analyzer
where
    I: IntoIterator<Item = (ModelId, Box<dyn ScoringModel>)>,
{
    let config = AnalyzerConfig {
        preprocess: small_preprocess(),
        ..AnalyzerConfig::default()
    };
    let registry = ModelRegistry::from_models(&config.preprocess, models);
    Analyzer::new(registry, config).unwrap()
}

#[derive(Default)]
pub(crate) struct MemoryImageSource {
    images: BTreeMap<String, Vec<u8>>,
}

impl MemoryImageSource {
    pub(crate) fn insert(&mut self, locator: &str, bytes: Vec<u8>) {
        self.images.insert(locator.to_string(), bytes);
    }
}

impl ImageSource for MemoryImageSource {
    fn fetch(&self, locator: &str) -> AnalysisResult<Vec<u8>> {
        self.images
            .get(locator)
            .cloned()
            .ok_or_else(|| AnalysisError::Fetch {
                locator: locator.to_string(),
                reason: "not found".into(),
            })
    }
}

#[derive(Default)]
pub(crate) struct MemoryArtifactStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub(crate) fn contains(&self, tag: &str) -> bool {
        self.blobs.lock().unwrap().contains_key(tag)
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn store(&self, tag: &str, png: &[u8]) -> AnalysisResult<String> {
        self.blobs.lock().unwrap().insert(tag.to_string(), png.to_vec());
        Ok(format!("mem://{tag}"))
    }
}

pub(crate) struct FailingArtifactStore;

impl ArtifactStore for FailingArtifactStore {
    fn store(&self, tag: &str, _png: &[u8]) -> AnalysisResult<String> {
        Err(AnalysisError::Store {
            tag: tag.to_string(),
            reason: "bucket unavailable".into(),
        })
    }
}
