use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::median_filter;

/// CLAHE clip limit, as a multiple of the mean histogram bin height.
pub const CLAHE_CLIP_LIMIT: f32 = 2.0;

/// CLAHE tile grid (tiles per axis).
pub const CLAHE_GRID: u32 = 8;

/// Radius of the median denoising window (3x3).
const DENOISE_RADIUS: u32 = 1;

/// Prepares a screenshot for OCR: grayscale, denoise, then CLAHE.
///
/// The same fixed pipeline runs for every image and every engine.
pub fn preprocess(img: &DynamicImage) -> GrayImage {
    let gray = img.to_luma8();
    let denoised = denoise(&gray);
    equalize_adaptive(&denoised, CLAHE_CLIP_LIMIT, CLAHE_GRID)
}

/// Removes speckle noise with a small median filter.
pub fn denoise(img: &GrayImage) -> GrayImage {
    median_filter(img, DENOISE_RADIUS, DENOISE_RADIUS)
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into `grid` x `grid` tiles. Each tile gets its own
/// equalization lookup table, with histogram bins clipped at
/// `clip_limit * area / 256` and the excess redistributed evenly. Output
/// pixels blend the four nearest tile tables bilinearly.
pub fn equalize_adaptive(img: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }

    let tiles_x = grid.clamp(1, width);
    let tiles_y = grid.clamp(1, height);

    // Tile boundaries cover the whole image; edge tiles absorb the remainder.
    let bounds = |tiles: u32, len: u32, t: u32| (t * len / tiles, (t + 1) * len / tiles);

    let mut luts: Vec<[u8; 256]> = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        let (y0, y1) = bounds(tiles_y, height, ty);
        for tx in 0..tiles_x {
            let (x0, x1) = bounds(tiles_x, width, tx);
            luts.push(tile_lut(img, x0, x1, y0, y1, clip_limit));
        }
    }

    let tile_w = width as f32 / tiles_x as f32;
    let tile_h = height as f32 / tiles_y as f32;

    let mut output = GrayImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels() {
        let value = pixel[0] as usize;

        let fx = (x as f32 + 0.5) / tile_w - 0.5;
        let fy = (y as f32 + 0.5) / tile_h - 0.5;
        let (tx0, tx1, wx) = neighbours(fx, tiles_x);
        let (ty0, ty1, wy) = neighbours(fy, tiles_y);

        let lut = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][value] as f32;
        let top = lut(tx0, ty0) * (1.0 - wx) + lut(tx1, ty0) * wx;
        let bottom = lut(tx0, ty1) * (1.0 - wx) + lut(tx1, ty1) * wx;
        let blended = top * (1.0 - wy) + bottom * wy;

        output.put_pixel(x, y, Luma([blended.round().clamp(0.0, 255.0) as u8]));
    }

    output
}

/// Two neighbouring tile indices and the weight of the second one.
fn neighbours(pos: f32, tiles: u32) -> (u32, u32, f32) {
    let max = (tiles - 1) as f32;
    let clamped = pos.clamp(0.0, max);
    let lo = clamped.floor();
    let hi = (lo + 1.0).min(max);
    (lo as u32, hi as u32, clamped - lo)
}

/// Builds the clipped-histogram equalization table for one tile.
fn tile_lut(img: &GrayImage, x0: u32, x1: u32, y0: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[img.get_pixel(x, y)[0] as usize] += 1;
        }
    }

    let area = (x1 - x0) * (y1 - y0);
    let mut lut = [0u8; 256];
    if area == 0 {
        for (i, v) in lut.iter_mut().enumerate() {
            *v = i as u8;
        }
        return lut;
    }

    let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    let per_bin = excess / 256;
    let mut remainder = excess % 256;
    for bin in hist.iter_mut() {
        *bin += per_bin;
        if remainder > 0 {
            *bin += 1;
            remainder -= 1;
        }
    }

    let scale = 255.0 / area as f32;
    let mut cdf = 0u32;
    for (i, bin) in hist.iter().enumerate() {
        cdf += bin;
        lut[i] = (cdf as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    fn spread(img: &GrayImage) -> u8 {
        let min = img.pixels().map(|p| p[0]).min().unwrap();
        let max = img.pixels().map(|p| p[0]).max().unwrap();
        max - min
    }

    #[test]
    fn test_preprocess_keeps_dimensions() {
        let rgba: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_fn(40, 30, |x, y| Rgba([(x * 6) as u8, (y * 8) as u8, 90, 255]));
        let out = preprocess(&DynamicImage::ImageRgba8(rgba));
        assert_eq!(out.dimensions(), (40, 30));
    }

    #[test]
    fn test_denoise_removes_isolated_speck() {
        let mut img = GrayImage::from_pixel(5, 5, Luma([200]));
        img.put_pixel(2, 2, Luma([0]));
        let out = denoise(&img);
        assert_eq!(out.get_pixel(2, 2)[0], 200);
    }

    #[test]
    fn test_clahe_stretches_low_contrast() {
        // Values confined to 100..=115
        let img = GrayImage::from_fn(64, 64, |x, y| Luma([100 + ((x + y) % 16) as u8]));
        let out = equalize_adaptive(&img, CLAHE_CLIP_LIMIT, CLAHE_GRID);
        assert!(spread(&out) > spread(&img), "contrast should increase");
    }

    #[test]
    fn test_clahe_uniform_image_stays_uniform() {
        let img = GrayImage::from_pixel(48, 32, Luma([80]));
        let out = equalize_adaptive(&img, CLAHE_CLIP_LIMIT, CLAHE_GRID);
        let first = out.get_pixel(0, 0)[0];
        assert!(out.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn test_clahe_tiny_image() {
        let img = GrayImage::from_pixel(3, 2, Luma([50]));
        let out = equalize_adaptive(&img, CLAHE_CLIP_LIMIT, CLAHE_GRID);
        assert_eq!(out.dimensions(), (3, 2));
    }
}
