// Overlay mask construction: luminance threshold + morphological dilation

use image::RgbImage;
use rayon::prelude::*;

/// Binary overlay mask, same dimensions as the image that produced it.
///
/// One byte per pixel, row-major: 1 = overlay, 0 = background. A mask is
/// never persisted independently of its source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayMask {
    width: u32,
    height: u32,
    cells: Vec<u8>,
}

impl OverlayMask {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn is_overlay(&self, x: u32, y: u32) -> bool {
        self.cells[(y * self.width + x) as usize] != 0
    }

    /// Number of pixels marked as overlay.
    pub fn overlay_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c != 0).count()
    }

    pub fn matches(&self, image: &RgbImage) -> bool {
        self.width == image.width() && self.height == image.height()
    }
}

/// Mark every pixel whose luminance is >= `brightness_threshold` as overlay.
///
/// Luma weighting is 0.299 R + 0.587 G + 0.114 B. Overlay marks in the
/// target domain are high-brightness (white/light watermark text), so a
/// fixed global threshold suffices; the trade-off between residue and
/// over-erasure stays with the caller via the threshold.
pub fn threshold_mask(image: &RgbImage, brightness_threshold: u8) -> OverlayMask {
    let threshold = f32::from(brightness_threshold);
    let cells: Vec<u8> = image
        .as_raw()
        .par_chunks_exact(3)
        .map(|px| {
            let luma =
                0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2]);
            u8::from(luma >= threshold)
        })
        .collect();

    OverlayMask {
        width: image.width(),
        height: image.height(),
        cells,
    }
}

/// One morphological dilation pass with a 3x3 structuring element.
///
/// A cell is overlay in the output iff any of its 8 neighbors plus itself is
/// overlay in the input. Out-of-bounds neighbors count as background. This
/// absorbs anti-aliased watermark edges that fall just under the threshold.
pub fn dilate(mask: &OverlayMask) -> OverlayMask {
    let (w, h) = (mask.width as i64, mask.height as i64);
    let mut cells = vec![0u8; mask.cells.len()];

    for y in 0..h {
        for x in 0..w {
            let mut hit = 0u8;
            'probe: for dy in -1..=1 {
                for dx in -1..=1 {
                    let (nx, ny) = (x + dx, y + dy);
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        continue;
                    }
                    if mask.cells[(ny * w + nx) as usize] != 0 {
                        hit = 1;
                        break 'probe;
                    }
                }
            }
            cells[(y * w + x) as usize] = hit;
        }
    }

    OverlayMask {
        width: mask.width,
        height: mask.height,
        cells,
    }
}

/// Build the overlay mask for an image: threshold then one dilation pass.
pub fn build_mask(image: &RgbImage, brightness_threshold: u8) -> OverlayMask {
    dilate(&threshold_mask(image, brightness_threshold))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient_image() -> RgbImage {
        // Luma rises left to right: column x has gray value x * 25.
        RgbImage::from_fn(11, 4, |x, _| {
            let v = (x * 25).min(255) as u8;
            Rgb([v, v, v])
        })
    }

    #[test]
    fn raising_threshold_never_grows_the_mask() {
        let img = gradient_image();
        let mut previous = usize::MAX;
        for threshold in [150u8, 180, 200, 230, 250] {
            let count = threshold_mask(&img, threshold).overlay_count();
            assert!(
                count <= previous,
                "threshold {} grew the mask: {} > {}",
                threshold,
                count,
                previous
            );
            previous = count;
        }
    }

    #[test]
    fn dilation_never_shrinks_the_mask() {
        let img = gradient_image();
        let mask = threshold_mask(&img, 200);
        let dilated = dilate(&mask);
        assert!(dilated.overlay_count() >= mask.overlay_count());

        // And it is monotone across repeated passes.
        let twice = dilate(&dilated);
        assert!(twice.overlay_count() >= dilated.overlay_count());
    }

    #[test]
    fn dilation_grows_an_isolated_pixel_to_a_3x3_block() {
        let mut img = RgbImage::from_pixel(5, 5, Rgb([0, 0, 0]));
        img.put_pixel(2, 2, Rgb([255, 255, 255]));

        let mask = threshold_mask(&img, 200);
        assert_eq!(mask.overlay_count(), 1);

        let dilated = dilate(&mask);
        assert_eq!(dilated.overlay_count(), 9);
        for y in 1..=3 {
            for x in 1..=3 {
                assert!(dilated.is_overlay(x, y));
            }
        }
        assert!(!dilated.is_overlay(0, 0));
    }

    #[test]
    fn dilation_treats_out_of_bounds_as_background() {
        // Overlay pixel in the corner: dilation must not wrap or panic and
        // only the in-bounds 2x2 neighborhood lights up.
        let mut img = RgbImage::from_pixel(3, 3, Rgb([0, 0, 0]));
        img.put_pixel(0, 0, Rgb([255, 255, 255]));

        let dilated = dilate(&threshold_mask(&img, 200));
        assert_eq!(dilated.overlay_count(), 4);
        assert!(dilated.is_overlay(0, 0));
        assert!(dilated.is_overlay(1, 0));
        assert!(dilated.is_overlay(0, 1));
        assert!(dilated.is_overlay(1, 1));
    }

    #[test]
    fn luma_weighting_distinguishes_channels() {
        // Pure blue has low luma (0.114 * 255 ~ 29), pure white has 255.
        let mut img = RgbImage::from_pixel(2, 1, Rgb([255, 255, 255]));
        img.put_pixel(1, 0, Rgb([0, 0, 255]));

        let mask = threshold_mask(&img, 200);
        assert!(mask.is_overlay(0, 0));
        assert!(!mask.is_overlay(1, 0));
    }
}
