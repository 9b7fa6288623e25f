//! Image loading utilities.

use std::path::Path;

use image::{DynamicImage, ImageReader, RgbImage};

use crate::error::{Error, Result};

/// Load an image from disk as 8-bit RGB.
///
/// The format is detected from the file contents, so a PNG saved as `.jpg`
/// still decodes. The extension is only used when the contents are not
/// recognized.
///
/// Whatever the decoder produced (grayscale, RGBA, 16-bit, ...) is converted
/// to plain RGB so later stages never see decoder-specific layouts.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, or cannot be decoded.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let path = path.as_ref();

    let load_err = |source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    };

    let img = ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|err| load_err(err.into()))?
        .decode()
        .map_err(load_err)?;

    Ok(img.to_rgb8())
}

/// Decode an in-memory image, guessing the format from its contents.
///
/// # Errors
///
/// Returns an error if the bytes are not a supported image.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(bytes).map_err(|source| Error::ImageDecode { source })
}
