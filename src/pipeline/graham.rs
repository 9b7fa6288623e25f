//! Ben Graham preprocessing for fundus photographs.

use std::path::Path;

use image::{DynamicImage, RgbImage};
use imageproc::filter::gaussian_blur_f32;

use crate::error::{Error, Result};
use crate::image::{decode_image, into_normalized, load_image, NormalizedImage, TargetSize};

use super::mask::{apply_mask, circular_mask};
use super::resize::resize_bilinear;

/// Upper end of the 8-bit input range.
const BYTE_MAX: f32 = 255.0;

/// Configuration for the preprocessing transform.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    /// Output size. Images are resized only when their size differs.
    pub target_size: TargetSize,

    /// Mask radius as a fraction of half the shorter image side.
    pub mask_ratio: f64,

    /// Gaussian sigma (pixels) of the local-average estimate.
    pub blur_sigma: f32,

    /// Weight applied to `masked - blurred`.
    pub contrast_gain: f32,

    /// Mid-gray offset added after the high-pass, in 8-bit units.
    pub offset: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            target_size: TargetSize::default(),
            mask_ratio: 0.9,
            blur_sigma: 30.0,
            contrast_gain: 4.0,
            offset: 128.0,
        }
    }
}

impl PreprocessConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        self.target_size.validate()?;

        if !(self.mask_ratio > 0.0 && self.mask_ratio <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "mask_ratio".to_string(),
                reason: "must be in (0.0, 1.0]".to_string(),
            });
        }

        if !(self.blur_sigma.is_finite() && self.blur_sigma > 0.0) {
            return Err(Error::InvalidParameter {
                name: "blur_sigma".to_string(),
                reason: "must be a positive finite number".to_string(),
            });
        }

        if !self.contrast_gain.is_finite() || !self.offset.is_finite() {
            return Err(Error::InvalidParameter {
                name: "contrast_gain/offset".to_string(),
                reason: "must be finite".to_string(),
            });
        }

        Ok(())
    }
}

/// Stateless Ben Graham preprocessor.
///
/// Stages, in order:
/// 1. normalize to 8-bit RGB
/// 2. zero everything outside a centered circular mask
/// 3. high-pass: `masked * gain - blur(masked) * gain + offset`
/// 4. clip negatives to 0 (there is no upper clip)
/// 5. divide by 255 and resize to the target size
///
/// The same input and configuration always produce the same output.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
}

impl Preprocessor {
    /// Create a preprocessor with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Preprocess a decoded RGB image.
    ///
    /// # Errors
    ///
    /// Returns an error if the image has a zero dimension.
    ///
    /// Peak memory is about three full-resolution `f32` RGB buffers: the
    /// masked image plus the two passes of the separable blur.
    pub fn process(&self, image: &RgbImage) -> Result<NormalizedImage> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::UnsupportedDimensions {
                width,
                height,
                reason: "image is empty".to_string(),
            });
        }

        let mask = circular_mask(width, height, self.config.mask_ratio);
        let mut masked = apply_mask(image, &mask);
        let blurred = gaussian_blur_f32(&masked, self.config.blur_sigma);

        // The high-pass result overwrites the masked buffer in place.
        let gain = self.config.contrast_gain;
        let offset = self.config.offset;
        for (value, &local_mean) in masked.iter_mut().zip(blurred.iter()) {
            let contrast = gain * *value - gain * local_mean + offset;
            *value = contrast.max(0.0) / BYTE_MAX;
        }
        drop(blurred);

        let high_pass = into_normalized(masked)?;

        let target = self.config.target_size;
        if (width, height) == (target.width, target.height) {
            return Ok(high_pass);
        }

        Ok(resize_bilinear(
            high_pass.view(),
            target.width as usize,
            target.height as usize,
        ))
    }

    /// Preprocess any decoded image, converting it to 8-bit RGB first.
    ///
    /// # Errors
    ///
    /// Returns an error if the image has a zero dimension.
    pub fn process_dynamic(&self, image: &DynamicImage) -> Result<NormalizedImage> {
        self.process(&image.to_rgb8())
    }

    /// Load and preprocess an image file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded, or the image
    /// is empty.
    pub fn process_path<P: AsRef<Path>>(&self, path: P) -> Result<NormalizedImage> {
        let rgb = load_image(path)?;
        self.process(&rgb)
    }

    /// Decode and preprocess an in-memory image.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes cannot be decoded or the image is empty.
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<NormalizedImage> {
        let img = decode_image(bytes)?;
        self.process_dynamic(&img)
    }

    /// Like [`process_path`](Self::process_path), but logs the failure and
    /// returns `None` instead of an error.
    pub fn preprocess_or_warn<P: AsRef<Path>>(&self, path: P) -> Option<NormalizedImage> {
        let path = path.as_ref();
        match self.process_path(path) {
            Ok(out) => Some(out),
            Err(err) => {
                tracing::warn!("Could not preprocess {}: {err}", path.display());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn preprocessor(target: TargetSize) -> Preprocessor {
        Preprocessor::new(PreprocessConfig {
            target_size: target,
            ..PreprocessConfig::default()
        })
        .unwrap()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn textured(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                ((x * 31 + y * 17) % 256) as u8,
                ((x * 7 + y * 53 + 90) % 256) as u8,
                ((x ^ y) % 256) as u8,
            ])
        })
    }

    const FLAT_GRAY: f32 = 128.0 / 255.0;

    #[test]
    fn test_deterministic() {
        let pre = Preprocessor::default();
        let img = textured(180, 140);
        let first = pre.process(&img).unwrap();
        let second = pre.process(&img).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_output_shape_matches_target() {
        let img = textured(120, 90);
        for (w, h) in [(299, 299), (64, 32), (17, 200), (120, 90)] {
            let out = preprocessor(TargetSize::new(w, h)).process(&img).unwrap();
            assert_eq!(out.dim(), (h as usize, w as usize, 3), "target {w}x{h}");
        }
    }

    #[test]
    fn test_non_negative_and_finite() {
        let out = Preprocessor::default().process(&textured(200, 160)).unwrap();
        assert!(out.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn test_flat_gray_anchor() {
        let img = RgbImage::from_pixel(512, 512, Rgb([128, 128, 128]));
        let out = preprocessor(TargetSize::square(512)).process(&img).unwrap();

        // Center: uniform neighbourhood, so only the offset survives.
        for c in 0..3 {
            assert!((out[[256, 256, c]] - FLAT_GRAY).abs() < 1e-3);
        }

        // Just outside the disc the blurred rim drives values below zero.
        assert_eq!(out[[256 + 234, 256, 0]], 0.0);
        assert_eq!(out[[256, 256 - 234, 1]], 0.0);

        // Just inside the disc the overshoot exceeds 1.0 and is kept.
        assert!(out[[256 + 226, 256, 0]] > 1.0);

        assert!(out.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn test_flat_gray_resized_keeps_mid_field() {
        let img = RgbImage::from_pixel(512, 512, Rgb([128, 128, 128]));
        let out = Preprocessor::default().process(&img).unwrap();

        assert_eq!(out.dim(), (299, 299, 3));
        assert!((out[[149, 149, 2]] - FLAT_GRAY).abs() < 1e-3);

        let near_mid = out
            .iter()
            .filter(|v| (**v - FLAT_GRAY).abs() < 1e-2)
            .count();
        assert!(near_mid > out.len() / 8, "bulk should sit at the offset value");
    }

    #[test]
    fn test_empty_image_is_error() {
        let err = Preprocessor::default()
            .process(&RgbImage::new(0, 10))
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedDimensions { .. }));
    }

    #[test]
    fn test_unreadable_path_is_absent() {
        let pre = Preprocessor::default();
        assert!(pre.process_path("/no/such/fundus.png").is_err());
        assert!(pre.preprocess_or_warn("/no/such/fundus.png").is_none());
    }

    #[test]
    fn test_process_bytes_matches_process() {
        let img = textured(50, 40);
        let mut bytes = std::io::Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();

        let pre = preprocessor(TargetSize::new(32, 32));
        let from_bytes = pre.process_bytes(bytes.get_ref()).unwrap();
        assert_eq!(from_bytes, pre.process(&img).unwrap());
        assert!(pre.process_bytes(b"garbage").is_err());
    }

    #[test]
    fn test_process_path_sniffs_content_over_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fundus.jpg");
        let img = textured(40, 30);
        img.save_with_format(&path, image::ImageFormat::Png).unwrap();

        let pre = preprocessor(TargetSize::new(20, 20));
        let out = pre.process_path(&path).unwrap();
        assert_eq!(out, pre.process(&img).unwrap());
    }

    #[test]
    fn test_config_is_kept() {
        let config = PreprocessConfig {
            target_size: TargetSize::new(64, 48),
            blur_sigma: 10.0,
            ..PreprocessConfig::default()
        };
        let pre = Preprocessor::new(config.clone()).unwrap();
        assert_eq!(pre.config(), &config);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = [
            PreprocessConfig {
                target_size: TargetSize::new(0, 10),
                ..PreprocessConfig::default()
            },
            PreprocessConfig {
                mask_ratio: 0.0,
                ..PreprocessConfig::default()
            },
            PreprocessConfig {
                mask_ratio: 1.5,
                ..PreprocessConfig::default()
            },
            PreprocessConfig {
                blur_sigma: -1.0,
                ..PreprocessConfig::default()
            },
            PreprocessConfig {
                offset: f32::NAN,
                ..PreprocessConfig::default()
            },
        ];
        for config in bad {
            assert!(Preprocessor::new(config).is_err());
        }
    }
}
