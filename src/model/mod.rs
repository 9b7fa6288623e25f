//! Classifier gateway: model loading and prediction.

mod classifier;
mod loader;

pub use classifier::{
    classify_bytes, decode_scores, prepare_input, Classifier, InputTensor, OnnxClassifier,
    Prediction, SERVICE_INPUT_SIZE,
};
pub use loader::load_session;
