//! Severity classifier gateway.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::imageops::{self, FilterType};
use image::DynamicImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Error, Result};
use crate::grade::Grade;
use crate::image::{decode_image, RGB_CHANNELS};

use super::loader::load_session;

/// Classifier input in NHWC layout `(1, size, size, 3)`, values in `[0, 1]`.
pub type InputTensor = Array4<f32>;

/// Square input size expected by the deployed classifier.
pub const SERVICE_INPUT_SIZE: u32 = 224;

/// A predicted severity grade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub grade: Grade,
    /// Highest class score, as reported by the model.
    pub confidence: f32,
}

/// Anything that maps a prepared image tensor to a [`Prediction`].
///
/// Implementations are loaded once and shared read-only between callers.
pub trait Classifier: Send + Sync {
    /// Classify one prepared image.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails or the output is malformed.
    fn classify(&self, input: &InputTensor) -> Result<Prediction>;
}

/// Resize to `size` x `size`, scale to `[0, 1]` and add a batch axis.
///
/// This is the live-service normalization and is intentionally separate
/// from the Ben Graham transform used for offline datasets.
#[must_use]
pub fn prepare_input(image: &DynamicImage, size: u32) -> InputTensor {
    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, size, size, FilterType::CatmullRom);

    let side = size as usize;
    Array4::from_shape_fn((1, side, side, RGB_CHANNELS), |(_, y, x, c)| {
        // Safe: x and y are bounded by `size`, which is a u32.
        #[allow(clippy::cast_possible_truncation)]
        let pixel = resized.get_pixel(x as u32, y as u32);
        f32::from(pixel[c]) / 255.0
    })
}

/// Turn raw class scores into a prediction (argmax, first wins on ties).
///
/// # Errors
///
/// Returns an error unless there is exactly one finite score per grade.
pub fn decode_scores(scores: &[f32]) -> Result<Prediction> {
    if scores.len() != Grade::CLASSIFIER_ORDER.len() {
        return Err(Error::ShapeMismatch {
            expected: format!("{} class scores", Grade::CLASSIFIER_ORDER.len()),
            actual: format!("{} scores", scores.len()),
        });
    }

    if scores.iter().any(|s| !s.is_finite()) {
        return Err(Error::InvalidParameter {
            name: "scores".to_string(),
            reason: "classifier produced a non-finite score".to_string(),
        });
    }

    let mut best = 0;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > scores[best] {
            best = i;
        }
    }

    let grade = Grade::from_class_index(best).ok_or_else(|| Error::ShapeMismatch {
        expected: "known class index".to_string(),
        actual: best.to_string(),
    })?;

    Ok(Prediction {
        grade,
        confidence: scores[best],
    })
}

/// Decode an uploaded image and classify it with the service normalization.
///
/// # Errors
///
/// Returns an error if the bytes are not an image or classification fails.
pub fn classify_bytes(classifier: &dyn Classifier, bytes: &[u8], size: u32) -> Result<Prediction> {
    let image = decode_image(bytes)?;
    let input = prepare_input(&image, size);
    classifier.classify(&input)
}

/// Classifier backed by an ONNX Runtime session.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    path: PathBuf,
}

impl OnnxClassifier {
    /// Load the model at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let session = load_session(path)?;
        Ok(Self {
            session: Mutex::new(session),
            path: path.to_path_buf(),
        })
    }

    /// Path the model was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, input: &InputTensor) -> Result<Prediction> {
        let input_value =
            Tensor::from_array(input.clone()).map_err(|source| Error::Inference { source })?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::ClassifierUnavailable {
                reason: "session lock poisoned by a previous panic".to_string(),
            })?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|source| Error::Inference { source })?;

        let output = outputs
            .values()
            .next()
            .ok_or_else(|| Error::ShapeMismatch {
                expected: "class score output".to_string(),
                actual: "no output".to_string(),
            })?;

        let (_, scores) = output
            .try_extract_tensor::<f32>()
            .map_err(|source| Error::Inference { source })?;

        decode_scores(scores)
    }
}
