//! Ben Graham preprocessing pipeline.

mod graham;
mod mask;
mod resize;

pub use graham::{PreprocessConfig, Preprocessor};
pub use mask::{apply_mask, circular_mask};
pub use resize::resize_bilinear;
