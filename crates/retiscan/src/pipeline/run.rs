//! Pipeline orchestrator: segmentation -> classifier -> arbitration -> overlay.

use super::prelude::*;
use super::Analysis;

/// Decode `bytes` and analyze. An empty registry is rejected before decoding.
pub(crate) fn analyze_bytes(
    registry: &ModelRegistry,
    cfg: &PreprocessConfig,
    bytes: &[u8],
) -> AnalysisResult<Analysis> {
    ensure_models(registry)?;
    let image = decode_image(bytes)?;
    analyze_image(registry, cfg, &image)
}

pub(crate) fn analyze_image(
    registry: &ModelRegistry,
    cfg: &PreprocessConfig,
    image: &DynamicImage,
) -> AnalysisResult<Analysis> {
    ensure_models(registry)?;
    let image_size = [image.width(), image.height()];
    tracing::debug!(width = image_size[0], height = image_size[1], "analysis started");

    let segmentation: SegmentationOutput = run_segmentation(registry, image, cfg)?;
    let classifier = run_classifier(registry, image, cfg)?;
    let verdict: EnsembleVerdict = arbitrate(&segmentation.areas(), &classifier);

    let overlay = compose_overlay(image, &segmentation.overlay_mask);
    let overlay_png = encode_png(&overlay)?;

    tracing::info!(
        diagnosis = %verdict.final_diagnosis,
        score = verdict.severity_score,
        override_applied = verdict.override_applied,
        skipped = segmentation.skipped.len(),
        "analysis complete"
    );
    Ok(Analysis::new(verdict, &segmentation, image_size, overlay_png))
}

fn ensure_models(registry: &ModelRegistry) -> AnalysisResult<()> {
    if registry.is_empty() {
        return Err(AnalysisError::AllModelsUnavailable);
    }
    Ok(())
}
