use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, Rgb32FImage};

use super::LesionFinding;

/// Merge cleaned lesion masks into one `size`×`size` RGB mask in `[0, 1]`.
///
/// Channel mapping follows [`LesionType::overlay_channels`]; overlapping
/// lesions combine by per-channel maximum. Masks at another resolution are
/// resampled nearest-neighbour.
///
/// [`LesionType::overlay_channels`]: crate::LesionType::overlay_channels
pub fn composite_masks<'a, I>(findings: I, size: u32) -> Rgb32FImage
where
    I: IntoIterator<Item = &'a LesionFinding>,
{
    let mut out = Rgb32FImage::from_pixel(size, size, Rgb([0.0, 0.0, 0.0]));
    for finding in findings {
        let channels = finding.lesion.overlay_channels();
        let resized: GrayImage;
        let mask = if finding.cleaned_mask.dimensions() == (size, size) {
            &finding.cleaned_mask
        } else {
            resized = imageops::resize(&finding.cleaned_mask, size, size, FilterType::Nearest);
            &resized
        };
        for (dst, src) in out.pixels_mut().zip(mask.pixels()) {
            if src[0] == 0 {
                continue;
            }
            for (c, &on) in channels.iter().enumerate() {
                if on {
                    dst[c] = dst[c].max(1.0);
                }
            }
        }
    }
    out
}
