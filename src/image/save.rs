//! Image saving utilities.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::{ImageError, RgbImage};

use crate::error::{Error, Result};

use super::{NormalizedImage, RGB_CHANNELS};

/// Save a normalized image as an 8-bit file.
///
/// Every value is multiplied by 255 and truncated into the `u8` range (see
/// [`rescale`]). The format is inferred from the extension; JPEG output uses
/// `quality`, other formats ignore it. An existing file is overwritten.
///
/// # Errors
///
/// Returns an error if the array is not HWC with 3 channels or the file
/// cannot be written.
pub fn save_image<P: AsRef<Path>>(image: &NormalizedImage, path: P, quality: u8) -> Result<()> {
    let path = path.as_ref();
    let rgb = to_rgb8(image)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let save_err = |source: ImageError| Error::ImageSave {
        path: path.to_path_buf(),
        source,
    };

    match extension.as_deref() {
        Some("jpg" | "jpeg") => {
            let file = File::create(path).map_err(|e| save_err(ImageError::IoError(e)))?;
            let mut writer = BufWriter::new(file);
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut writer, quality);
            rgb.write_with_encoder(encoder).map_err(save_err)?;
            writer
                .flush()
                .map_err(|e| save_err(ImageError::IoError(e)))?;
        }
        _ => rgb.save(path).map_err(save_err)?,
    }

    Ok(())
}

/// Convert a normalized image back to 8-bit RGB.
///
/// # Errors
///
/// Returns an error if the array does not have 3 channels or is too large
/// for an image buffer.
pub fn to_rgb8(image: &NormalizedImage) -> Result<RgbImage> {
    let (height, width, channels) = image.dim();
    if channels != RGB_CHANNELS {
        return Err(Error::ShapeMismatch {
            expected: format!("{RGB_CHANNELS} channels"),
            actual: format!("{channels} channels"),
        });
    }

    let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(Error::ShapeMismatch {
            expected: "dimensions that fit in u32".to_string(),
            actual: format!("{width}x{height}"),
        });
    };

    let raw: Vec<u8> = image.iter().copied().map(rescale).collect();

    RgbImage::from_raw(w, h, raw).ok_or_else(|| Error::ShapeMismatch {
        expected: format!("{width}x{height}x{RGB_CHANNELS} buffer"),
        actual: "short buffer".to_string(),
    })
}

/// Map a normalized value back to a byte.
///
/// `value * 255` truncated toward zero; anything above 255 saturates and
/// NaN becomes 0.
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn rescale(value: f32) -> u8 {
    (value * 255.0) as u8
}
