//! Lesion overlay compositing.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, Rgb32FImage, RgbImage};

use crate::error::{AnalysisError, AnalysisResult};

/// Share of the original pixel replaced where the mask is on.
const ATTENUATION: f32 = 0.4;
/// Mask intensity added on top of the attenuated original.
const MASK_GAIN: f32 = 0.5;

/// Blend `mask` over `original` resized to the mask geometry:
/// `out = original * (1 - mask * 0.4) + mask * 0.5`, clipped to `[0, 1]`.
pub fn compose_overlay(original: &DynamicImage, mask: &Rgb32FImage) -> RgbImage {
    let (w, h) = mask.dimensions();
    let base = original.resize_exact(w, h, FilterType::Triangle).to_rgb8();
    RgbImage::from_fn(w, h, |x, y| {
        let o = base.get_pixel(x, y);
        let m = mask.get_pixel(x, y);
        let mut px = [0u8; 3];
        for c in 0..3 {
            let orig = o[c] as f32 / 255.0;
            let v = orig * (1.0 - m[c] * ATTENUATION) + m[c] * MASK_GAIN;
            px[c] = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        Rgb(px)
    })
}

/// PNG-encode an RGB image.
pub fn encode_png(image: &RgbImage) -> AnalysisResult<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|err| AnalysisError::Encode(format!("png: {err}")))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::synthetic_fundus;

    #[test]
    fn empty_mask_only_resizes() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 32, Rgb([10, 200, 90])));
        let mask = Rgb32FImage::new(8, 8);
        let out = compose_overlay(&img, &mask);
        assert_eq!(out.dimensions(), (8, 8));
        assert!(out.pixels().all(|p| p.0 == [10, 200, 90]));
    }

    #[test]
    fn full_mask_blends_toward_colour() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([0, 255, 100])));
        let mask = Rgb32FImage::from_pixel(4, 4, Rgb([1.0, 0.0, 1.0]));
        let out = compose_overlay(&img, &mask);
        let p = out.get_pixel(0, 0).0;
        // red: 0 * 0.6 + 0.5; green: untouched; blue: 100/255 * 0.6 + 0.5
        assert_eq!(p[0], 128);
        assert_eq!(p[1], 255);
        assert_eq!(p[2], ((100.0f32 / 255.0 * 0.6 + 0.5) * 255.0).round() as u8);
    }

    #[test]
    fn bright_pixels_clip() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([255, 255, 255])));
        let mask = Rgb32FImage::from_pixel(2, 2, Rgb([1.0, 1.0, 1.0]));
        let out = compose_overlay(&img, &mask);
        // 1.0 * 0.6 + 0.5 = 1.1 clips to white
        assert!(out.pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn compositing_is_pixel_reproducible() {
        let img = synthetic_fundus(90, 70);
        let mask = Rgb32FImage::from_fn(16, 16, |x, y| {
            Rgb([(x % 2) as f32, (y % 3 == 0) as u8 as f32, 0.0])
        });
        let a = encode_png(&compose_overlay(&img, &mask)).unwrap();
        let b = encode_png(&compose_overlay(&img, &mask)).unwrap();
        assert_eq!(a, b);
        assert_eq!(&a[1..4], b"PNG");
    }

    #[test]
    fn encoding_failure_is_not_a_store_error() {
        let err = encode_png(&RgbImage::new(0, 0)).unwrap_err();
        assert!(matches!(err, AnalysisError::Encode(_)));
        assert_eq!(err.kind(), crate::error::ErrorKind::Encode);
    }
}
