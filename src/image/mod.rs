//! Image loading, saving, and the normalized image representation.

mod load;
mod save;

pub use load::{decode_image, load_image};
pub use save::{rescale, save_image, to_rgb8};

use image::Rgb32FImage;
use ndarray::Array3;

use crate::error::{Error, Result};

/// Preprocessed image in HWC layout (height, width, channels), RGB order.
///
/// Values are non-negative but have no enforced upper bound: the high-pass
/// stage can push bright detail above 1.0.
pub type NormalizedImage = Array3<f32>;

/// Number of channels in RGB images.
pub const RGB_CHANNELS: usize = 3;

/// Reinterpret an `f32` RGB buffer as a [`NormalizedImage`] without copying.
///
/// # Errors
///
/// Returns an error if the buffer length does not match its dimensions.
pub fn into_normalized(image: Rgb32FImage) -> Result<NormalizedImage> {
    let (width, height) = image.dimensions();
    let shape = (height as usize, width as usize, RGB_CHANNELS);
    Array3::from_shape_vec(shape, image.into_raw()).map_err(|err| Error::ShapeMismatch {
        expected: format!("{shape:?}"),
        actual: err.to_string(),
    })
}

/// Spatial size of a preprocessed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    /// Create a target size from width and height.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Create a square target size.
    #[must_use]
    pub const fn square(side: u32) -> Self {
        Self::new(side, side)
    }

    /// Shape of a [`NormalizedImage`] with this size.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize, usize) {
        (self.height as usize, self.width as usize, RGB_CHANNELS)
    }

    /// Validate that both dimensions are non-zero.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidParameter {
                name: "target_size".to_string(),
                reason: format!("must be non-zero, got {}x{}", self.width, self.height),
            });
        }
        Ok(())
    }
}

impl Default for TargetSize {
    /// 299x299, the input size of the Inception-style classifier.
    fn default() -> Self {
        Self::square(299)
    }
}
