pub(crate) use image::DynamicImage;

pub(crate) use crate::arbitration::{arbitrate, EnsembleVerdict};
pub(crate) use crate::classifier::run_classifier;
pub(crate) use crate::config::PreprocessConfig;
pub(crate) use crate::error::{AnalysisError, AnalysisResult};
pub(crate) use crate::overlay::{compose_overlay, encode_png};
pub(crate) use crate::preprocess::decode_image;
pub(crate) use crate::registry::ModelRegistry;
pub(crate) use crate::segmentation::{run_segmentation, SegmentationOutput};
