//! Lesion segmentation ensemble.
//!
//! For every loaded lesion model: infer a probability map, binarize at the
//! lesion threshold, drop connected components below the lesion minimum
//! area, and count the surviving pixels. Missing models are skipped; their
//! area reads as zero downstream.

mod composite;
mod denoise;

pub use composite::composite_masks;
pub use denoise::{denoise, denoise_with_stats, foreground_area, DenoiseStats};

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb32FImage};

use crate::config::PreprocessConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::lesion::{LesionAreas, LesionType};
use crate::preprocess::{self, ModelFamily, PreprocessedTensor};
use crate::registry::{ModelId, ModelRegistry, RawOutput};

/// Per-pixel lesion probability map.
pub type ScoreMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Mask value for positive pixels.
pub const FOREGROUND: u8 = 255;

/// Result of segmenting one lesion type.
///
/// `cleaned_mask` is always a subset of `binarized_mask`.
#[derive(Debug, Clone)]
pub struct LesionFinding {
    pub lesion: LesionType,
    pub raw_score_map: ScoreMap,
    pub binarized_mask: GrayImage,
    pub cleaned_mask: GrayImage,
    /// Foreground pixels left in `cleaned_mask`.
    pub area: u64,
    pub denoise: DenoiseStats,
}

impl LesionFinding {
    /// Binarize and denoise `map` with the fixed parameters of `lesion`.
    pub fn from_score_map(lesion: LesionType, map: ScoreMap) -> Self {
        let params = lesion.params();
        let binarized = binarize(&map, params.threshold);
        let (cleaned, stats) = match params.min_area {
            Some(min_area) => denoise_with_stats(&binarized, min_area),
            None => (binarized.clone(), DenoiseStats::default()),
        };
        let area = foreground_area(&cleaned);
        Self {
            lesion,
            raw_score_map: map,
            binarized_mask: binarized,
            cleaned_mask: cleaned,
            area,
            denoise: stats,
        }
    }
}

/// Foreground where the probability is strictly above `threshold`.
pub fn binarize(map: &ScoreMap, threshold: f32) -> GrayImage {
    GrayImage::from_fn(map.width(), map.height(), |x, y| {
        Luma([if map.get_pixel(x, y)[0] > threshold {
            FOREGROUND
        } else {
            0
        }])
    })
}

/// Interpret a raw model output as a 2-D probability map clamped to `[0, 1]`.
pub fn score_map_from_output(model: ModelId, output: RawOutput) -> AnalysisResult<ScoreMap> {
    let (h, w) = output.spatial_dims().ok_or_else(|| {
        AnalysisError::inference(
            model,
            format!("expected a single-channel probability map, got shape {:?}", output.shape),
        )
    })?;
    if output.data.len() != h * w {
        return Err(AnalysisError::inference(
            model,
            format!("output holds {} values for a {h}x{w} map", output.data.len()),
        ));
    }
    let data = output
        .data
        .into_iter()
        .map(|p| if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) })
        .collect();
    ImageBuffer::from_raw(w as u32, h as u32, data)
        .ok_or_else(|| AnalysisError::inference(model, "probability map dimensions overflow"))
}

/// All lesion findings for one image plus the composited overlay mask.
#[derive(Debug, Clone)]
pub struct SegmentationOutput {
    pub findings: Vec<LesionFinding>,
    /// Lesion types whose model was unavailable.
    pub skipped: Vec<LesionType>,
    /// RGB mask at the segmentation resolution, values in `[0, 1]`.
    pub overlay_mask: Rgb32FImage,
}

impl SegmentationOutput {
    pub fn finding(&self, lesion: LesionType) -> Option<&LesionFinding> {
        self.findings.iter().find(|f| f.lesion == lesion)
    }

    /// Surviving area per lesion type; skipped lesions read as zero.
    pub fn areas(&self) -> LesionAreas {
        let mut areas = LesionAreas::default();
        for f in &self.findings {
            areas.set(f.lesion, f.area);
        }
        areas
    }
}

/// Run every available lesion model on `image`.
///
/// Models run one after another. A missing member is skipped; any other
/// failure aborts the whole stage.
pub fn run_segmentation(
    registry: &ModelRegistry,
    image: &DynamicImage,
    cfg: &PreprocessConfig,
) -> AnalysisResult<SegmentationOutput> {
    let mut findings = Vec::new();
    let mut skipped = Vec::new();
    let mut seg_tensor: Option<PreprocessedTensor> = None;

    for lesion in LesionType::ALL {
        let id = lesion.model_id();
        if !registry.has(id) {
            tracing::debug!(lesion = %lesion, "no model loaded; skipping");
            skipped.push(lesion);
            continue;
        }

        // Lesion models share one segmentation tensor; each call gets its own copy.
        let tensor = match id.family() {
            ModelFamily::Segmentation => seg_tensor
                .get_or_insert_with(|| preprocess::prepare(image, ModelFamily::Segmentation, cfg))
                .clone(),
            family => preprocess::prepare(image, family, cfg),
        };

        let raw = match registry.infer(id, tensor) {
            Ok(raw) => raw,
            Err(err) if err.is_recoverable() => {
                tracing::warn!(lesion = %lesion, error = %err, "lesion model skipped");
                skipped.push(lesion);
                continue;
            }
            Err(err) => return Err(err),
        };

        let finding = LesionFinding::from_score_map(lesion, score_map_from_output(id, raw)?);
        tracing::debug!(
            lesion = %lesion,
            area = finding.area,
            components = finding.denoise.components,
            removed = finding.denoise.removed,
            "lesion segmented"
        );
        findings.push(finding);
    }

    let overlay_mask = composite_masks(&findings, cfg.segmentation_size);
    Ok(SegmentationOutput {
        findings,
        skipped,
        overlay_mask,
    })
}
