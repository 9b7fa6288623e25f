//! Batch preprocessing of labelled dataset directories.
//!
//! A dataset root holds one subfolder per severity grade (see
//! [`Grade::folder_name`](crate::grade::Grade::folder_name)). Every image in
//! those folders is preprocessed independently and written to the same
//! relative path under the output root.

mod discover;
mod runner;

pub use discover::{has_image_extension, BatchJob, WorkItem, IMAGE_EXTENSIONS};
pub use runner::BatchRunner;

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::grade::Grade;

/// Configuration for a batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Worker threads. `None` uses the available parallelism.
    ///
    /// Each worker holds about three `f32` RGB copies of its current image,
    /// roughly 430 MB for a 4000x3000 photograph. Lower this for large
    /// originals on memory-constrained machines.
    pub workers: Option<usize>,

    /// JPEG quality (1-100) for `.jpg`/`.jpeg` outputs.
    pub output_quality: u8,

    /// Draw a progress bar on stderr.
    pub show_progress: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: None,
            output_quality: 95,
            show_progress: true,
        }
    }
}

impl BatchConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.workers == Some(0) {
            return Err(Error::InvalidParameter {
                name: "workers".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if !(1..=100).contains(&self.output_quality) {
            return Err(Error::InvalidParameter {
                name: "output_quality".to_string(),
                reason: "must be between 1 and 100".to_string(),
            });
        }

        Ok(())
    }

    /// Number of worker threads to spawn.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
        })
    }
}

/// One image that could not be preprocessed or written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub source: PathBuf,
    pub reason: String,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Images found across all grade folders.
    pub discovered: usize,

    /// Images found per grade, in scan order. Only present folders appear.
    pub per_grade: Vec<(Grade, usize)>,

    /// Images written successfully.
    pub succeeded: usize,

    /// Failed images, in discovery order.
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    /// Number of failed images.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Whether every discovered image was written.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Discovered count for one grade, `None` if its folder was absent.
    #[must_use]
    pub fn discovered_for(&self, grade: Grade) -> Option<usize> {
        self.per_grade
            .iter()
            .find_map(|&(g, count)| (g == grade).then_some(count))
    }
}
