//! # `retinaprep`
//!
//! Ben Graham preprocessing for diabetic-retinopathy fundus photographs.
//!
//! The transform masks the retinal disc with a fixed-ratio circle, subtracts
//! a heavily blurred local average to boost local contrast, clips negatives,
//! scales by 1/255 and resizes to the classifier input size. A batch runner
//! applies it to a labelled dataset tree in parallel, and a small gateway
//! feeds images to an ONNX severity classifier.
//!
//! ## Example
//!
//! ```no_run
//! use retinaprep::{BatchConfig, BatchRunner, PreprocessConfig, Preprocessor};
//!
//! # fn main() -> retinaprep::Result<()> {
//! let preprocessor = Preprocessor::new(PreprocessConfig::default())?;
//! let normalized = preprocessor.process_path("fundus.jpeg")?;
//! assert_eq!(normalized.dim(), (299, 299, 3));
//!
//! let runner = BatchRunner::new(preprocessor, BatchConfig::default())?;
//! let report = runner.run("colored_images", "preprocessed")?;
//! println!("{} of {} written", report.succeeded, report.discovered);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod error;
pub mod grade;
pub mod image;
pub mod model;
pub mod pipeline;

pub use batch::{BatchConfig, BatchReport, BatchRunner};
pub use error::{Error, Result};
pub use grade::Grade;
pub use crate::image::{NormalizedImage, TargetSize};
pub use model::{Classifier, OnnxClassifier, Prediction};
pub use pipeline::{PreprocessConfig, Preprocessor};
