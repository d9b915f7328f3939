// Fast-marching-style region filling
//
// Masked pixels are processed in order of increasing geometric distance to
// the nearest unmasked pixel, so pixels filled earlier are available as
// source data for pixels deeper inside the region.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use image::RgbImage;

use super::mask::OverlayMask;
use crate::core::errors::{InpaintError, InpaintResult};

const SQRT_2: f32 = std::f32::consts::SQRT_2;

/// Heap entry for the multi-source distance sweep. Ordered so the smallest
/// distance pops first; ties break on index to keep the sweep deterministic.
struct Node {
    dist: f32,
    idx: usize,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the minimum distance.
        other
            .dist
            .partial_cmp(&self.dist)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

/// Distance from each masked pixel to the nearest unmasked pixel,
/// approximated over the 8-connected grid (1 / sqrt(2) step costs).
/// Background pixels have distance 0.
fn distance_field(mask: &OverlayMask) -> Vec<f32> {
    let (w, h) = (mask.width() as i64, mask.height() as i64);
    let total = (w * h) as usize;
    let mut dist = vec![f32::INFINITY; total];
    let mut heap = BinaryHeap::new();

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            if !mask.is_overlay(x as u32, y as u32) {
                dist[idx] = 0.0;
                heap.push(Node { dist: 0.0, idx });
            }
        }
    }

    while let Some(Node { dist: d, idx }) = heap.pop() {
        if d > dist[idx] {
            continue;
        }
        let (x, y) = ((idx as i64) % w, (idx as i64) / w);
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let nidx = (ny * w + nx) as usize;
                if !mask.is_overlay(nx as u32, ny as u32) {
                    continue;
                }
                let step = if dx != 0 && dy != 0 { SQRT_2 } else { 1.0 };
                let candidate = d + step;
                if candidate < dist[nidx] {
                    dist[nidx] = candidate;
                    heap.push(Node {
                        dist: candidate,
                        idx: nidx,
                    });
                }
            }
        }
    }

    dist
}

/// Unit gradient of the distance field at a pixel, i.e. the direction the
/// fill front advances. `None` when the field is locally flat.
fn front_normal(dist: &[f32], w: i64, h: i64, x: i64, y: i64) -> Option<(f64, f64)> {
    let at = |px: i64, py: i64| -> f64 {
        if px < 0 || py < 0 || px >= w || py >= h {
            f64::from(dist[(y * w + x) as usize])
        } else {
            f64::from(dist[(py * w + px) as usize])
        }
    };

    let gx = (at(x + 1, y) - at(x - 1, y)) * 0.5;
    let gy = (at(x, y + 1) - at(x, y - 1)) * 0.5;
    let norm = (gx * gx + gy * gy).sqrt();
    if norm < 1e-9 {
        None
    } else {
        Some((gx / norm, gy / norm))
    }
}

/// Fill every masked pixel from its surroundings.
///
/// Each masked pixel becomes a weighted average of known pixels (unmasked,
/// or masked but already filled) in the +/-`radius` window around it. The
/// weight combines inverse squared distance with a directional term that
/// favors samples lying along the fill front's normal, which keeps edges
/// running into the region from smearing sideways.
///
/// Unmasked pixels pass through byte-identical.
pub fn inpaint(image: &RgbImage, mask: &OverlayMask, radius: u32) -> InpaintResult<RgbImage> {
    if radius == 0 {
        return Err(InpaintError::InvalidRadius(radius));
    }
    if !mask.matches(image) {
        return Err(InpaintError::DimensionMismatch {
            image_width: image.width(),
            image_height: image.height(),
            mask_width: mask.width(),
            mask_height: mask.height(),
        });
    }

    let (w, h) = (image.width() as i64, image.height() as i64);
    let total = (w * h) as usize;
    let overlay = mask.overlay_count();
    if overlay == total {
        return Err(InpaintError::FullyMasked);
    }
    if overlay == 0 {
        return Ok(image.clone());
    }

    let dist = distance_field(mask);

    // Masked pixels, nearest-to-boundary first. Ties break on index so the
    // fill order (and therefore the output) is fully deterministic.
    let mut order: Vec<usize> = (0..total)
        .filter(|&idx| dist[idx] > 0.0)
        .collect();
    order.sort_unstable_by(|&a, &b| {
        dist[a]
            .partial_cmp(&dist[b])
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.cmp(&b))
    });

    let mut out = image.clone();
    let mut known: Vec<bool> = dist.iter().map(|&d| d == 0.0).collect();
    let r = radius as i64;

    for &idx in &order {
        let (x, y) = (idx % w as usize, idx / w as usize);
        let (xi, yi) = (x as i64, y as i64);
        let normal = front_normal(&dist, w, h, xi, yi);

        let mut acc = [0.0f64; 3];
        let mut weight_sum = 0.0f64;

        for dy in -r..=r {
            for dx in -r..=r {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let (qx, qy) = (xi + dx, yi + dy);
                if qx < 0 || qy < 0 || qx >= w || qy >= h {
                    continue;
                }
                let qidx = (qy * w + qx) as usize;
                if !known[qidx] {
                    continue;
                }

                let d2 = (dx * dx + dy * dy) as f64;
                let d = d2.sqrt();
                let dir = match normal {
                    Some((nx, ny)) => {
                        (((dx as f64) * nx + (dy as f64) * ny) / d).abs().max(1e-6)
                    }
                    None => 1.0,
                };
                let weight = dir / d2;

                let px = out.get_pixel(qx as u32, qy as u32);
                acc[0] += weight * f64::from(px[0]);
                acc[1] += weight * f64::from(px[1]);
                acc[2] += weight * f64::from(px[2]);
                weight_sum += weight;
            }
        }

        // Distance ordering guarantees at least one known 8-neighbor, and
        // the window always covers the 8-neighborhood for radius >= 1.
        debug_assert!(weight_sum > 0.0);
        if weight_sum > 0.0 {
            let pixel = image::Rgb([
                (acc[0] / weight_sum).round().clamp(0.0, 255.0) as u8,
                (acc[1] / weight_sum).round().clamp(0.0, 255.0) as u8,
                (acc[2] / weight_sum).round().clamp(0.0, 255.0) as u8,
            ]);
            out.put_pixel(x as u32, y as u32, pixel);
        }
        known[idx] = true;
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::inpaint::mask::{build_mask, threshold_mask};
    use image::Rgb;

    /// Deterministic non-uniform test image.
    fn textured_image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            Rgb([
                ((x * 37 + y * 11) % 200) as u8,
                ((x * 13 + y * 53) % 200) as u8,
                ((x * 7 + y * 29) % 200) as u8,
            ])
        })
    }

    /// Image with a bright square stamped in the middle.
    fn stamped_image() -> RgbImage {
        let mut img = RgbImage::from_pixel(16, 16, Rgb([80, 120, 160]));
        for y in 6..10 {
            for x in 6..10 {
                img.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        img
    }

    #[test]
    fn unmasked_pixels_are_byte_identical() {
        let img = textured_image(20, 20);
        let mut bright = img.clone();
        for y in 8..12 {
            for x in 8..12 {
                bright.put_pixel(x, y, Rgb([250, 250, 250]));
            }
        }
        let mask = build_mask(&bright, 240);
        assert!(mask.overlay_count() > 0);

        let filled = inpaint(&bright, &mask, 3).unwrap();
        for y in 0..20 {
            for x in 0..20 {
                if !mask.is_overlay(x, y) {
                    assert_eq!(
                        filled.get_pixel(x, y),
                        bright.get_pixel(x, y),
                        "background pixel ({}, {}) was modified",
                        x,
                        y
                    );
                }
            }
        }
    }

    #[test]
    fn uniform_surroundings_fill_exactly() {
        let img = stamped_image();
        let mask = build_mask(&img, 240);
        let filled = inpaint(&img, &mask, 3).unwrap();

        // Every sample has the same value, so the weighted average is exact.
        for y in 0..16 {
            for x in 0..16 {
                assert_eq!(filled.get_pixel(x, y), &Rgb([80, 120, 160]));
            }
        }
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let img = textured_image(8, 8);
        let other = textured_image(9, 8);
        let mask = threshold_mask(&other, 150);

        match inpaint(&img, &mask, 3) {
            Err(InpaintError::DimensionMismatch { .. }) => {}
            other => panic!("expected DimensionMismatch, got {:?}", other.err()),
        }
    }

    #[test]
    fn fully_masked_image_is_rejected() {
        let img = RgbImage::from_pixel(4, 4, Rgb([255, 255, 255]));
        let mask = threshold_mask(&img, 150);
        assert_eq!(mask.overlay_count(), 16);

        assert!(matches!(
            inpaint(&img, &mask, 3),
            Err(InpaintError::FullyMasked)
        ));
    }

    #[test]
    fn empty_mask_returns_the_image_unchanged() {
        let img = textured_image(6, 6);
        let mask = threshold_mask(&img, 250);
        assert_eq!(mask.overlay_count(), 0);

        let filled = inpaint(&img, &mask, 3).unwrap();
        assert_eq!(filled.as_raw(), img.as_raw());
    }

    #[test]
    fn zero_radius_is_rejected() {
        let img = textured_image(6, 6);
        let mask = threshold_mask(&img, 150);
        assert!(matches!(
            inpaint(&img, &mask, 0),
            Err(InpaintError::InvalidRadius(0))
        ));
    }

    #[test]
    fn fill_is_deterministic() {
        let img = stamped_image();
        let mask = build_mask(&img, 240);
        let a = inpaint(&img, &mask, 3).unwrap();
        let b = inpaint(&img, &mask, 3).unwrap();
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn distance_field_orders_boundary_before_center() {
        let img = stamped_image();
        let mask = build_mask(&img, 240);
        let dist = distance_field(&mask);
        let w = 16usize;

        // The stamp spans 6..10 with one dilation ring around it (5..11).
        // A ring pixel must be closer to the boundary than the center.
        let ring = dist[6 * w + 5];
        let center = dist[8 * w + 8];
        assert!(ring > 0.0);
        assert!(center > ring);
    }
}
