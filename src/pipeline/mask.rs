//! Fixed-ratio circular mask approximating the visible retinal disc.

use image::{GrayImage, Luma, Rgb, Rgb32FImage, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;

/// Build a binary mask (1 inside, 0 outside) for an image of the given size.
///
/// The circle is centered at `(width / 2, height / 2)` and its radius is
/// `floor((min(width, height) / 2) * ratio)`, both using integer halves.
/// No attempt is made to find the real fundus boundary.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn circular_mask(width: u32, height: u32, ratio: f64) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return mask;
    }

    let half = width.min(height) / 2;
    let radius = (f64::from(half) * ratio).floor() as i32;
    let center = ((width / 2) as i32, (height / 2) as i32);

    draw_filled_circle_mut(&mut mask, center, radius, Luma([1]));
    mask
}

/// Zero every channel outside the mask and widen to `f32`.
///
/// # Panics
///
/// Panics if the mask and image dimensions differ.
#[must_use]
pub fn apply_mask(image: &RgbImage, mask: &GrayImage) -> Rgb32FImage {
    assert_eq!(
        image.dimensions(),
        mask.dimensions(),
        "mask must match image dimensions"
    );

    let (width, height) = image.dimensions();
    Rgb32FImage::from_fn(width, height, |x, y| {
        if mask.get_pixel(x, y)[0] == 0 {
            Rgb([0.0; 3])
        } else {
            Rgb(image.get_pixel(x, y).0.map(f32::from))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_geometry() {
        let mask = circular_mask(512, 512, 0.9);
        assert_eq!(mask.dimensions(), (512, 512));

        // radius = floor(256 * 0.9) = 230
        assert_eq!(mask.get_pixel(256, 256)[0], 1);
        assert_eq!(mask.get_pixel(256 + 225, 256)[0], 1);
        assert_eq!(mask.get_pixel(256, 256 - 225)[0], 1);
        assert_eq!(mask.get_pixel(256 + 235, 256)[0], 0);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(511, 511)[0], 0);
    }

    #[test]
    fn test_mask_uses_shorter_side() {
        let mask = circular_mask(400, 200, 0.9);
        // radius = floor(100 * 0.9) = 90, center (200, 100)
        assert_eq!(mask.get_pixel(200, 100)[0], 1);
        assert_eq!(mask.get_pixel(200 + 85, 100)[0], 1);
        assert_eq!(mask.get_pixel(200 + 95, 100)[0], 0);
        assert_eq!(mask.get_pixel(10, 100)[0], 0);
    }

    #[test]
    fn test_mask_is_binary() {
        let mask = circular_mask(37, 53, 0.9);
        assert!(mask.pixels().all(|p| p[0] <= 1));
        assert!(mask.pixels().any(|p| p[0] == 1));
    }

    #[test]
    fn test_apply_mask_zeroes_outside() {
        let image = RgbImage::from_pixel(64, 64, Rgb([10, 20, 30]));
        let mask = circular_mask(64, 64, 0.9);
        let masked = apply_mask(&image, &mask);

        assert_eq!(masked.dimensions(), (64, 64));
        assert_eq!(masked.get_pixel(32, 32).0, [10.0, 20.0, 30.0]);
        assert_eq!(masked.get_pixel(0, 0).0, [0.0; 3]);
        assert_eq!(masked.get_pixel(0, 63).0, [0.0; 3]);
    }
}
