use image::RgbImage;

/// Unsharp mask tuned for vascular contrast: `4 * img - 4 * blur(img) + 128`,
/// saturated to `u8`.
///
/// A sigma that is not a positive finite number blurs nothing, so every
/// pixel lands on the bias.
pub fn unsharp_mask(rgb: &RgbImage, sigma: f32) -> RgbImage {
    if !(sigma.is_finite() && sigma > 0.0) {
        return RgbImage::from_pixel(rgb.width(), rgb.height(), image::Rgb([128; 3]));
    }
    let blurred = imageproc::filter::gaussian_blur_f32(rgb, sigma);
    let mut out = RgbImage::new(rgb.width(), rgb.height());
    for ((dst, &src), &blur) in out
        .iter_mut()
        .zip(rgb.as_raw().iter())
        .zip(blurred.as_raw().iter())
    {
        let v = 4.0 * src as f32 - 4.0 * blur as f32 + 128.0;
        *dst = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn degenerate_sigma_does_not_panic() {
        let img = RgbImage::from_fn(12, 12, |x, y| Rgb([(x * 20) as u8, (y * 20) as u8, 60]));
        for sigma in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let out = unsharp_mask(&img, sigma);
            assert_eq!(out.dimensions(), (12, 12));
            assert!(out.as_raw().iter().all(|&v| v == 128));
        }
    }

    #[test]
    fn black_maps_to_bias() {
        let img = RgbImage::new(20, 20);
        let out = unsharp_mask(&img, 3.0);
        assert!(out.as_raw().iter().all(|&v| v == 128));
    }

    #[test]
    fn bright_line_is_amplified() {
        let img = RgbImage::from_fn(31, 31, |x, _| {
            if x == 15 {
                Rgb([200, 200, 200])
            } else {
                Rgb([40, 40, 40])
            }
        });
        let out = unsharp_mask(&img, 4.0);
        assert_eq!(out.get_pixel(15, 15)[0], 255);
        assert!(out.get_pixel(12, 15)[0] < 128);
    }
}
