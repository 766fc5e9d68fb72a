//! Per-family image adapters.
//!
//! Each adapter turns a decoded fundus photograph into the exact NHWC tensor
//! one model family expects:
//!
//! - **Segmentation**: resize, scale to `[0, 1]`.
//! - **Vessel**: resize, green channel, CLAHE, scale to `[0, 1]`, one channel.
//! - **Classifier**: resize, unsharp mask, channel normalization.
//!
//! The adapters are total over decoded images; the only failure path is
//! [`decode_image`] on malformed bytes.

mod clahe;
mod sharpen;

pub use clahe::clahe;
pub use sharpen::unsharp_mask;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};

use crate::config::{ChannelNormalization, ClaheConfig, PreprocessConfig};
use crate::error::{AnalysisError, AnalysisResult};

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Model family a tensor was prepared for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Segmentation,
    Vessel,
    Classifier,
}

/// Dense `f32` tensor in NHWC layout, tagged with its target family.
///
/// Moved into exactly one inference call and dropped there.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedTensor {
    family: ModelFamily,
    shape: [usize; 4],
    data: Vec<f32>,
}

impl PreprocessedTensor {
    pub(crate) fn new(family: ModelFamily, shape: [usize; 4], data: Vec<f32>) -> Self {
        debug_assert_eq!(shape.iter().product::<usize>(), data.len());
        Self {
            family,
            shape,
            data,
        }
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Decode encoded raster bytes (PNG/JPEG).
pub fn decode_image(bytes: &[u8]) -> AnalysisResult<DynamicImage> {
    if bytes.is_empty() {
        return Err(AnalysisError::MalformedImage("empty input".into()));
    }
    Ok(image::load_from_memory(bytes)?)
}

fn resize_rgb(image: &DynamicImage, size: u32) -> RgbImage {
    image.resize_exact(size, size, FilterType::Triangle).to_rgb8()
}

/// Resize to `size`², scale to `[0, 1]`, shape `[1, size, size, 3]`.
pub fn to_segmentation_tensor(image: &DynamicImage, size: u32) -> PreprocessedTensor {
    let rgb = resize_rgb(image, size);
    let data = rgb.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
    let s = size as usize;
    PreprocessedTensor::new(ModelFamily::Segmentation, [1, s, s, 3], data)
}

/// Resize to `size`², keep the green channel, apply CLAHE, scale to `[0, 1]`,
/// shape `[1, size, size, 1]`.
pub fn to_vessel_tensor(image: &DynamicImage, size: u32, clahe_cfg: &ClaheConfig) -> PreprocessedTensor {
    let rgb = resize_rgb(image, size);
    let green = GrayImage::from_fn(size, size, |x, y| image::Luma([rgb.get_pixel(x, y)[1]]));
    let enhanced = clahe(&green, clahe_cfg);
    let data = enhanced.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
    let s = size as usize;
    PreprocessedTensor::new(ModelFamily::Vessel, [1, s, s, 1], data)
}

/// Resize to `size`², sharpen with an unsharp mask, normalize channels,
/// shape `[1, size, size, 3]`.
pub fn to_classifier_tensor(
    image: &DynamicImage,
    size: u32,
    sigma: f32,
    normalization: ChannelNormalization,
) -> PreprocessedTensor {
    let rgb = resize_rgb(image, size);
    let sharpened = unsharp_mask(&rgb, sigma);
    let data = sharpened
        .as_raw()
        .chunks_exact(3)
        .flat_map(|px| {
            let mut out = [0.0f32; 3];
            for c in 0..3 {
                let unit = px[c] as f32 / 255.0;
                out[c] = match normalization {
                    ChannelNormalization::Imagenet => (unit - IMAGENET_MEAN[c]) / IMAGENET_STD[c],
                    ChannelNormalization::UnitRange => unit,
                };
            }
            out
        })
        .collect();
    let s = size as usize;
    PreprocessedTensor::new(ModelFamily::Classifier, [1, s, s, 3], data)
}

/// Build the tensor for `family` using the configured geometry.
pub fn prepare(image: &DynamicImage, family: ModelFamily, cfg: &PreprocessConfig) -> PreprocessedTensor {
    match family {
        ModelFamily::Segmentation => to_segmentation_tensor(image, cfg.segmentation_size),
        ModelFamily::Vessel => to_vessel_tensor(image, cfg.vessel_size, &cfg.clahe),
        ModelFamily::Classifier => to_classifier_tensor(
            image,
            cfg.classifier_size,
            cfg.unsharp_sigma,
            cfg.classifier_normalization,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{encode_png, synthetic_fundus};
    use approx::assert_abs_diff_eq;
    use image::Rgb;

    #[test]
    fn segmentation_tensor_is_unit_scaled_nhwc() {
        let img = synthetic_fundus(300, 280);
        let t = to_segmentation_tensor(&img, 256);
        assert_eq!(t.family(), ModelFamily::Segmentation);
        assert_eq!(t.shape(), [1, 256, 256, 3]);
        assert_eq!(t.data().len(), 256 * 256 * 3);
        assert!(t.data().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn vessel_tensor_has_single_channel() {
        let img = synthetic_fundus(128, 128);
        let t = to_vessel_tensor(&img, 64, &ClaheConfig::default());
        assert_eq!(t.shape(), [1, 64, 64, 1]);
        assert!(t.data().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn vessel_tensor_reads_only_the_green_channel() {
        let base = synthetic_fundus(32, 32).to_rgb8();
        let recolor = |f: &dyn Fn(&Rgb<u8>) -> Rgb<u8>| {
            let mut img = base.clone();
            for px in img.pixels_mut() {
                *px = f(px);
            }
            DynamicImage::ImageRgb8(img)
        };
        let cfg = ClaheConfig::default();
        let reference = to_vessel_tensor(&DynamicImage::ImageRgb8(base.clone()), 32, &cfg);

        let red_blue_swapped = recolor(&|p| Rgb([255 - p[0], p[1], 255 - p[2]]));
        assert_eq!(to_vessel_tensor(&red_blue_swapped, 32, &cfg), reference);

        let green_inverted = recolor(&|p| Rgb([p[0], 255 - p[1], p[2]]));
        assert_ne!(to_vessel_tensor(&green_inverted, 32, &cfg), reference);
    }

    #[test]
    fn classifier_tensor_with_zero_sigma_is_panic_free() {
        let img = synthetic_fundus(40, 40);
        let t = to_classifier_tensor(&img, 16, 0.0, ChannelNormalization::UnitRange);
        for &v in t.data() {
            assert_abs_diff_eq!(v, 128.0 / 255.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn classifier_unit_range_on_black_is_mid_grey() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(64, 64));
        let t = to_classifier_tensor(&img, 32, 3.0, ChannelNormalization::UnitRange);
        assert_eq!(t.shape(), [1, 32, 32, 3]);
        for &v in t.data() {
            assert_abs_diff_eq!(v, 128.0 / 255.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn classifier_imagenet_normalization_applies_per_channel() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(16, 16));
        let t = to_classifier_tensor(&img, 8, 2.0, ChannelNormalization::Imagenet);
        let unit = 128.0 / 255.0;
        assert_abs_diff_eq!(t.data()[0], (unit - 0.485) / 0.229, epsilon = 1e-5);
        assert_abs_diff_eq!(t.data()[1], (unit - 0.456) / 0.224, epsilon = 1e-5);
        assert_abs_diff_eq!(t.data()[2], (unit - 0.406) / 0.225, epsilon = 1e-5);
    }

    #[test]
    fn prepare_uses_configured_sizes() {
        let img = synthetic_fundus(100, 100);
        let cfg = PreprocessConfig {
            segmentation_size: 32,
            vessel_size: 48,
            classifier_size: 24,
            unsharp_sigma: 2.0,
            ..PreprocessConfig::default()
        };
        assert_eq!(prepare(&img, ModelFamily::Segmentation, &cfg).shape(), [1, 32, 32, 3]);
        assert_eq!(prepare(&img, ModelFamily::Vessel, &cfg).shape(), [1, 48, 48, 1]);
        assert_eq!(prepare(&img, ModelFamily::Classifier, &cfg).shape(), [1, 24, 24, 3]);
    }

    #[test]
    fn decode_rejects_garbage_and_accepts_png() {
        assert!(matches!(
            decode_image(b"not an image"),
            Err(AnalysisError::MalformedImage(_))
        ));
        assert!(matches!(decode_image(&[]), Err(AnalysisError::MalformedImage(_))));

        let bytes = encode_png(&synthetic_fundus(20, 10));
        let img = decode_image(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (20, 10));
    }
}
