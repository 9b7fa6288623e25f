//! `retinaprep` CLI - Ben Graham preprocessing for fundus images.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use retinaprep::model::{classify_bytes, SERVICE_INPUT_SIZE};
use retinaprep::{
    BatchConfig, BatchRunner, OnnxClassifier, PreprocessConfig, Preprocessor, TargetSize,
};

/// Ben Graham preprocessing for diabetic-retinopathy fundus images.
#[derive(Parser, Debug)]
#[command(name = "retinaprep")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Preprocess every image of a labelled dataset tree.
    Batch {
        /// Dataset root containing Mild, Moderate, No_DR, Proliferate_DR and Severe folders.
        #[arg(value_name = "INPUT_DIR")]
        input: PathBuf,

        /// Root of the mirrored output tree.
        #[arg(value_name = "OUTPUT_DIR")]
        output: PathBuf,

        #[command(flatten)]
        size: SizeArgs,

        /// Worker threads. Defaults to the number of CPUs. Each worker needs
        /// about 36 bytes per source pixel.
        #[arg(short, long, value_name = "INT")]
        jobs: Option<usize>,

        /// Output JPEG quality (1-100).
        #[arg(short, long, default_value = "95", value_name = "INT")]
        quality: u8,
    },

    /// Preprocess a single image.
    Preprocess {
        /// Input image path.
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output image path.
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        #[command(flatten)]
        size: SizeArgs,

        /// Output JPEG quality (1-100).
        #[arg(short, long, default_value = "95", value_name = "INT")]
        quality: u8,
    },

    /// Classify an image with an ONNX severity model.
    Predict {
        /// Image to classify.
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Path to the ONNX model.
        #[arg(short, long, value_name = "PATH")]
        model: PathBuf,

        /// Square input size expected by the model.
        #[arg(long, default_value_t = SERVICE_INPUT_SIZE, value_name = "INT")]
        input_size: u32,
    },
}

#[derive(Args, Debug)]
struct SizeArgs {
    /// Output width in pixels.
    #[arg(long, default_value = "299", value_name = "INT")]
    width: u32,

    /// Output height in pixels.
    #[arg(long, default_value = "299", value_name = "INT")]
    height: u32,
}

impl SizeArgs {
    fn preprocessor(&self) -> Result<Preprocessor> {
        let config = PreprocessConfig {
            target_size: TargetSize::new(self.width, self.height),
            ..PreprocessConfig::default()
        };
        Preprocessor::new(config).context("Invalid preprocessing options")
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("retinaprep={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&cli.command) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(command: &Command) -> Result<()> {
    match command {
        Command::Batch {
            input,
            output,
            size,
            jobs,
            quality,
        } => {
            let config = BatchConfig {
                workers: *jobs,
                output_quality: *quality,
                ..BatchConfig::default()
            };
            let runner =
                BatchRunner::new(size.preprocessor()?, config).context("Invalid batch options")?;

            tracing::info!("Preprocessing images and saving to {}", output.display());
            let report = runner
                .run(input, output)
                .context("Batch preprocessing aborted")?;

            println!("Found {} images", report.discovered);
            for (grade, count) in &report.per_grade {
                println!("  {:<15} {count}", grade.folder_name());
            }
            println!(
                "Processed {} images, {} failed",
                report.succeeded,
                report.failed()
            );
            for failure in &report.failures {
                println!("Failed to process {}: {}", failure.source.display(), failure.reason);
            }
        }

        Command::Preprocess {
            input,
            output,
            size,
            quality,
        } => {
            if !input.exists() {
                anyhow::bail!("Input file does not exist: {}", input.display());
            }

            let normalized = size
                .preprocessor()?
                .process_path(input)
                .context("Failed to preprocess image")?;
            retinaprep::image::save_image(&normalized, output, *quality)
                .context("Failed to save image")?;

            println!(
                "Successfully processed {} -> {}",
                input.display(),
                output.display()
            );
        }

        Command::Predict {
            image,
            model,
            input_size,
        } => {
            // Load the model before touching the input so a bad model fails fast.
            let classifier = OnnxClassifier::load(model).context("Failed to load classifier")?;
            tracing::debug!(
                "Classifying {} with {}",
                image.display(),
                classifier.path().display()
            );

            let bytes = std::fs::read(image)
                .with_context(|| format!("Failed to read {}", image.display()))?;
            let prediction = classify_bytes(&classifier, &bytes, *input_size)
                .context("Failed to classify image")?;

            println!(
                "class: {}, confidence: {:.4}",
                prediction.grade, prediction.confidence
            );
        }
    }

    Ok(())
}
