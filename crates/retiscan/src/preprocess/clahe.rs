//! Contrast-limited adaptive histogram equalization.
//!
//! Tile histograms are clipped at `clip_limit * tile_area / 256`, the excess
//! is spread over all bins, and the per-tile lookup tables are blended
//! bilinearly between tile centers.

use image::{GrayImage, Luma};

use crate::config::ClaheConfig;

const BINS: usize = 256;

/// Tile boundaries `[start, end)` along one axis, splitting `len` into `grid` parts.
fn tile_bounds(len: u32, grid: u32) -> Vec<(u32, u32)> {
    (0..grid)
        .map(|t| (t * len / grid, (t + 1) * len / grid))
        .collect()
}

/// For each coordinate along an axis: the two neighbouring tile indices and
/// the blend weight of the second one.
fn axis_weights(bounds: &[(u32, u32)], len: u32) -> Vec<(usize, usize, f32)> {
    let centers: Vec<f32> = bounds
        .iter()
        .map(|&(s, e)| (s + e) as f32 * 0.5 - 0.5)
        .collect();
    let last = centers.len() - 1;
    (0..len)
        .map(|p| {
            let p = p as f32;
            if p <= centers[0] {
                return (0, 0, 0.0);
            }
            if p >= centers[last] {
                return (last, last, 0.0);
            }
            let t = centers
                .windows(2)
                .position(|w| p >= w[0] && p < w[1])
                .unwrap_or(last - 1);
            let f = (p - centers[t]) / (centers[t + 1] - centers[t]);
            (t, t + 1, f)
        })
        .collect()
}

fn tile_lut(gray: &GrayImage, (x0, x1): (u32, u32), (y0, y1): (u32, u32), clip_limit: f32) -> [u8; BINS] {
    let mut hist = [0u32; BINS];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    let area = ((x1 - x0) * (y1 - y0)).max(1);

    let clip = ((clip_limit * area as f32 / BINS as f32) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }
    let redistribute = excess / BINS as u32;
    let residual = (excess % BINS as u32) as usize;
    for bin in hist.iter_mut() {
        *bin += redistribute;
    }
    if residual > 0 {
        let step = (BINS / residual).max(1);
        for bin in hist.iter_mut().step_by(step).take(residual) {
            *bin += 1;
        }
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; BINS];
    let mut cumulative = 0u32;
    for (v, &count) in hist.iter().enumerate() {
        cumulative += count;
        lut[v] = (cumulative as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

/// Equalize `gray` with a `tile_grid`×`tile_grid` CLAHE.
///
/// The grid is reduced for images smaller than `tile_grid` pixels per side.
pub fn clahe(gray: &GrayImage, cfg: &ClaheConfig) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let grid_x = cfg.tile_grid.clamp(1, w);
    let grid_y = cfg.tile_grid.clamp(1, h);
    let xb = tile_bounds(w, grid_x);
    let yb = tile_bounds(h, grid_y);

    let mut luts = Vec::with_capacity((grid_x * grid_y) as usize);
    for &ty in &yb {
        for &tx in &xb {
            luts.push(tile_lut(gray, tx, ty, cfg.clip_limit));
        }
    }

    let wx = axis_weights(&xb, w);
    let wy = axis_weights(&yb, h);
    let stride = grid_x as usize;

    GrayImage::from_fn(w, h, |x, y| {
        let v = gray.get_pixel(x, y)[0] as usize;
        let (tx0, tx1, fx) = wx[x as usize];
        let (ty0, ty1, fy) = wy[y as usize];
        let at = |ty: usize, tx: usize| luts[ty * stride + tx][v] as f32;
        let top = at(ty0, tx0) * (1.0 - fx) + at(ty0, tx1) * fx;
        let bottom = at(ty1, tx0) * (1.0 - fx) + at(ty1, tx1) * fx;
        let out = top * (1.0 - fy) + bottom * fy;
        Luma([out.round().clamp(0.0, 255.0) as u8])
    })
}
