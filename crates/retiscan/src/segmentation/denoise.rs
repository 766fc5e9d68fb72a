//! Connected-component denoising of binary lesion masks.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use super::FOREGROUND;

/// Component counts from one denoising pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DenoiseStats {
    /// 8-connected foreground components in the input.
    pub components: usize,
    /// Components dropped for being smaller than the minimum area.
    pub removed: usize,
}

/// Remove 8-connected foreground components with fewer than `min_area` pixels.
///
/// Any non-zero pixel is foreground. The result only ever clears pixels, and
/// applying it twice gives the same mask as applying it once.
pub fn denoise(mask: &GrayImage, min_area: u32) -> GrayImage {
    denoise_with_stats(mask, min_area).0
}

/// [`denoise`] plus component statistics.
pub fn denoise_with_stats(mask: &GrayImage, min_area: u32) -> (GrayImage, DenoiseStats) {
    // Labelling groups equal-valued pixels, so collapse to one foreground value first.
    let binary;
    let mask = if mask.as_raw().iter().all(|&v| v == 0 || v == FOREGROUND) {
        mask
    } else {
        binary = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
            Luma([if mask.get_pixel(x, y)[0] > 0 { FOREGROUND } else { 0 }])
        });
        &binary
    };

    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let mut sizes: Vec<u32> = Vec::new();
    for px in labels.pixels() {
        let label = px[0] as usize;
        if label == 0 {
            continue;
        }
        if label >= sizes.len() {
            sizes.resize(label + 1, 0);
        }
        sizes[label] += 1;
    }

    let components = sizes.iter().filter(|&&n| n > 0).count();
    let removed = sizes.iter().filter(|&&n| n > 0 && n < min_area).count();

    let cleaned = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let label = labels.get_pixel(x, y)[0] as usize;
        if label != 0 && sizes[label] >= min_area {
            Luma([FOREGROUND])
        } else {
            Luma([0])
        }
    });
    (cleaned, DenoiseStats { components, removed })
}

/// Number of foreground pixels.
pub fn foreground_area(mask: &GrayImage) -> u64 {
    mask.as_raw().iter().filter(|&&v| v > 0).count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn mask_from(rows: &[&str]) -> GrayImage {
        let h = rows.len() as u32;
        let w = rows[0].len() as u32;
        GrayImage::from_fn(w, h, |x, y| {
            let c = rows[y as usize].as_bytes()[x as usize];
            Luma([if c == b'#' { FOREGROUND } else { 0 }])
        })
    }

    fn is_subset(inner: &GrayImage, outer: &GrayImage) -> bool {
        inner
            .as_raw()
            .iter()
            .zip(outer.as_raw())
            .all(|(&a, &b)| a == 0 || b > 0)
    }

    #[test]
    fn diagonal_pixels_join_one_component() {
        let mask = mask_from(&[
            "#....", //
            ".#...", //
            "..#..", //
            ".....", //
            "....#",
        ]);
        let (cleaned, stats) = denoise_with_stats(&mask, 3);
        assert_eq!(stats.components, 2);
        assert_eq!(stats.removed, 1);
        assert_eq!(foreground_area(&cleaned), 3);
        assert_eq!(cleaned.get_pixel(4, 4)[0], 0);
    }

    #[test]
    fn component_exactly_at_minimum_survives() {
        let mask = mask_from(&[
            "##...", //
            "##...", //
            ".....", //
            "...#.",
        ]);
        let cleaned = denoise(&mask, 4);
        assert_eq!(foreground_area(&cleaned), 4);
    }

    #[test]
    fn zero_min_area_keeps_everything() {
        let mask = mask_from(&["#.#", "...", "#.#"]);
        assert_eq!(denoise(&mask, 0), mask);
    }

    #[test]
    fn non_binary_values_count_as_foreground() {
        let mut mask = GrayImage::new(4, 1);
        mask.put_pixel(0, 0, Luma([7]));
        mask.put_pixel(1, 0, Luma([200]));
        let (cleaned, stats) = denoise_with_stats(&mask, 2);
        assert_eq!(stats.components, 1);
        assert_eq!(foreground_area(&cleaned), 2);
    }

    #[test]
    fn random_masks_are_idempotent_subsets() {
        let mut rng = StdRng::seed_from_u64(7);
        for &k in &[1u32, 5, 15, 20] {
            for _ in 0..10 {
                let mask = GrayImage::from_fn(40, 30, |_, _| {
                    Luma([if rng.gen_bool(0.3) { FOREGROUND } else { 0 }])
                });
                let once = denoise(&mask, k);
                let twice = denoise(&once, k);
                assert_eq!(once, twice, "not idempotent for k={k}");
                assert!(is_subset(&once, &mask), "not a subset for k={k}");
            }
        }
    }

    #[test]
    fn fixed_input_is_byte_identical() {
        let mut rng = StdRng::seed_from_u64(99);
        let mask = GrayImage::from_fn(64, 64, |_, _| {
            Luma([if rng.gen_bool(0.2) { FOREGROUND } else { 0 }])
        });
        assert_eq!(denoise(&mask, 5).as_raw(), denoise(&mask, 5).as_raw());
    }
}
