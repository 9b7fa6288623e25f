//! Parallel batch runner.

use std::fs;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::error::{Error, Result};
use crate::image::save_image;
use crate::pipeline::Preprocessor;

use super::{BatchConfig, BatchFailure, BatchJob, BatchReport, WorkItem};

/// Applies a [`Preprocessor`] to every image of a labelled dataset tree.
///
/// Images are independent, so they are processed on a worker pool in no
/// particular order. One bad image never stops the run; it is recorded in
/// the returned [`BatchReport`]. There is no checkpointing: an interrupted
/// run is simply started again, overwriting what was already written.
pub struct BatchRunner {
    preprocessor: Preprocessor,
    config: BatchConfig,
}

impl BatchRunner {
    /// Create a runner.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch configuration is invalid.
    pub fn new(preprocessor: Preprocessor, config: BatchConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            preprocessor,
            config,
        })
    }

    /// Preprocess every image under `input_root` into `output_root`.
    ///
    /// # Errors
    ///
    /// Fails before processing anything if `input_root` is not a directory,
    /// `output_root` cannot be created, or the worker pool cannot start.
    /// Per-image failures are reported in the [`BatchReport`] instead.
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_root: P,
        output_root: Q,
    ) -> Result<BatchReport> {
        let pb = self.progress_bar();
        self.run_with_progress(input_root.as_ref(), output_root.as_ref(), &pb)
    }

    /// [`run`](Self::run), advancing `pb` once per processed file.
    fn run_with_progress(
        &self,
        input_root: &Path,
        output_root: &Path,
        pb: &ProgressBar,
    ) -> Result<BatchReport> {
        if !input_root.is_dir() {
            return Err(Error::InputRoot {
                path: input_root.to_path_buf(),
            });
        }

        fs::create_dir_all(output_root).map_err(|source| Error::OutputDir {
            path: output_root.to_path_buf(),
            source,
        })?;

        let job = BatchJob::discover(input_root, output_root);
        let target = self.preprocessor.config().target_size;
        tracing::info!(
            "Found {} images to process, resizing to {}x{}",
            job.len(),
            target.width,
            target.height
        );

        let workers = self.config.worker_count();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|source| Error::WorkerPool { source })?;
        tracing::debug!("Processing with {workers} workers");

        pb.set_length(job.len() as u64);

        let outcomes: Vec<Result<()>> = pool.install(|| {
            job.items()
                .par_iter()
                .map(|item| {
                    let outcome = self.process_item(item);
                    pb.inc(1);
                    outcome
                })
                .collect()
        });

        pb.finish_with_message("Preprocessing complete");

        let mut report = BatchReport {
            discovered: job.len(),
            per_grade: job.per_grade().to_vec(),
            ..BatchReport::default()
        };

        for (item, outcome) in job.items().iter().zip(outcomes) {
            match outcome {
                Ok(()) => report.succeeded += 1,
                Err(err) => {
                    tracing::warn!("Failed to process {}: {err}", item.source.display());
                    report.failures.push(BatchFailure {
                        source: item.source.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Processed {} of {} images ({} failed)",
            report.succeeded,
            report.discovered,
            report.failed()
        );

        Ok(report)
    }

    /// Preprocess one image and write it to its mirrored path.
    fn process_item(&self, item: &WorkItem) -> Result<()> {
        let normalized = self.preprocessor.process_path(&item.source)?;

        if let Some(parent) = item.destination.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::OutputDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        save_image(&normalized, &item.destination, self.config.output_quality)
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Preprocessing [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .expect("valid template")
                .progress_chars("#>-"),
        );
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grade::Grade;
    use crate::image::TargetSize;
    use crate::pipeline::PreprocessConfig;
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;

    fn runner(target: TargetSize) -> BatchRunner {
        let preprocessor = Preprocessor::new(PreprocessConfig {
            target_size: target,
            ..PreprocessConfig::default()
        })
        .unwrap();
        BatchRunner::new(
            preprocessor,
            BatchConfig {
                workers: Some(2),
                show_progress: false,
                ..BatchConfig::default()
            },
        )
        .unwrap()
    }

    fn write_fundus(path: &Path, width: u32, height: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_fn(width, height, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            let v = ((x + y) % 200) as u8;
            Rgb([v, v / 2, 40])
        })
        .save(path)
        .unwrap();
    }

    struct Dataset {
        _dir: tempfile::TempDir,
        input: PathBuf,
        output: PathBuf,
    }

    fn dataset() -> Dataset {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("colored_images");
        let output = dir.path().join("preprocessed");

        write_fundus(&input.join("No_DR/a.png"), 80, 60);
        write_fundus(&input.join("No_DR/b.jpg"), 64, 64);
        write_fundus(&input.join("Mild/c.tif"), 50, 70);
        write_fundus(&input.join("Proliferate_DR/d.PNG"), 40, 40);
        fs::write(input.join("Mild/labels.csv"), b"id,grade\n").unwrap();
        fs::create_dir_all(input.join("Moderate")).unwrap();
        fs::write(input.join("Moderate/broken.png"), b"\x89PNG not really").unwrap();
        fs::create_dir_all(input.join("Severe")).unwrap();
        fs::write(input.join("Severe/README.txt"), b"nothing here").unwrap();

        Dataset {
            _dir: dir,
            input,
            output,
        }
    }

    #[test]
    fn test_partial_failure_isolated() {
        let data = dataset();
        let report = runner(TargetSize::new(32, 24))
            .run(&data.input, &data.output)
            .unwrap();

        assert_eq!(report.discovered, 5);
        assert_eq!(report.succeeded, 4);
        assert_eq!(report.failed(), 1);
        assert_eq!(
            report.failures[0].source,
            data.input.join("Moderate/broken.png")
        );
        assert!(!report.failures[0].reason.is_empty());

        for rel in ["No_DR/a.png", "No_DR/b.jpg", "Mild/c.tif", "Proliferate_DR/d.PNG"] {
            let written = image::open(data.output.join(rel)).unwrap();
            assert_eq!((written.width(), written.height()), (32, 24), "{rel}");
        }
        assert!(!data.output.join("Moderate/broken.png").exists());
        assert!(!data.output.join("Mild/labels.csv").exists());
    }

    #[test]
    fn test_empty_severe_folder() {
        let data = dataset();
        let report = runner(TargetSize::square(16))
            .run(&data.input, &data.output)
            .unwrap();

        assert_eq!(report.discovered_for(Grade::Severe), Some(0));
        assert!(data.output.join("Severe").is_dir());
        assert!(report
            .failures
            .iter()
            .all(|f| !f.source.starts_with(data.input.join("Severe"))));
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let data = dataset();
        let runner = runner(TargetSize::square(16));

        let first = runner.run(&data.input, &data.output).unwrap();
        let second = runner.run(&data.input, &data.output).unwrap();

        assert_eq!(first.discovered, second.discovered);
        assert_eq!(first.succeeded, second.succeeded);
        assert_eq!(first.failures, second.failures);
    }

    #[test]
    fn test_flat_gray_written_at_mid_value() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        fs::create_dir_all(input.join("No_DR")).unwrap();
        RgbImage::from_pixel(512, 512, Rgb([128, 128, 128]))
            .save(input.join("No_DR/gray.png"))
            .unwrap();

        let report = runner(TargetSize::default()).run(&input, &output).unwrap();
        assert!(report.is_clean());

        let written = image::open(output.join("No_DR/gray.png")).unwrap().to_rgb8();
        assert_eq!(written.dimensions(), (299, 299));
        let center = written.get_pixel(149, 149);
        assert!(center.0.iter().all(|&v| (127..=128).contains(&v)), "{center:?}");
    }

    #[test]
    fn test_missing_input_root_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let err = runner(TargetSize::square(16))
            .run(dir.path().join("missing"), dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, Error::InputRoot { .. }));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_unwritable_output_root_fails_fast() {
        let data = dataset();
        fs::create_dir_all(data.output.parent().unwrap()).unwrap();
        fs::write(&data.output, b"a file, not a directory").unwrap();

        let err = runner(TargetSize::square(16))
            .run(&data.input, &data.output)
            .unwrap_err();
        assert!(matches!(err, Error::OutputDir { .. }));
    }

    #[test]
    fn test_progress_advances_once_per_file() {
        let data = dataset();
        let pb = ProgressBar::hidden();
        let report = runner(TargetSize::square(16))
            .run_with_progress(&data.input, &data.output, &pb)
            .unwrap();

        // Failed files still count as processed.
        assert_eq!(pb.length(), Some(report.discovered as u64));
        assert_eq!(pb.position(), 5);
        assert!(pb.is_finished());
    }

    #[test]
    fn test_missing_input_root_leaves_progress_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let pb = ProgressBar::hidden();
        let result = runner(TargetSize::square(16)).run_with_progress(
            &dir.path().join("missing"),
            &dir.path().join("out"),
            &pb,
        );

        assert!(result.is_err());
        assert_eq!(pb.position(), 0);
        assert!(!pb.is_finished());
    }
}
