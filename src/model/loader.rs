//! ONNX model loading.

use std::path::Path;

use ort::session::Session;

use crate::error::{Error, Result};

/// Load an ONNX model session from a local file.
///
/// There is no fallback model: a missing or corrupt file is an error the
/// caller is expected to treat as fatal.
///
/// # Errors
///
/// Returns an error if the file does not exist or the runtime rejects it.
pub fn load_session<P: AsRef<Path>>(path: P) -> Result<Session> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(Error::ClassifierUnavailable {
            reason: format!("model file {} does not exist", path.display()),
        });
    }

    tracing::info!("Loading model from {}", path.display());

    let session = Session::builder()
        .map_err(|source| Error::ModelLoad {
            path: path.to_path_buf(),
            source,
        })?
        .commit_from_file(path)
        .map_err(|source| Error::ModelLoad {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::info!("Model loaded successfully");
    Ok(session)
}
