//! Work-item discovery for labelled dataset trees.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::grade::Grade;

/// File extensions (lowercase, without the dot) that are picked up.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "tif", "tiff"];

/// Whether `path` has one of [`IMAGE_EXTENSIONS`], ignoring case.
#[must_use]
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// A single image to preprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub grade: Grade,
}

/// All work for one batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchJob {
    items: Vec<WorkItem>,
    per_grade: Vec<(Grade, usize)>,
}

impl BatchJob {
    /// Scan the grade folders under `input_root`.
    ///
    /// Folders are visited in [`Grade::DATASET_ORDER`]; missing ones are
    /// skipped. For every present folder the mirrored folder under
    /// `output_root` is created if needed. Files inside a folder are sorted by
    /// name. Only regular files with an image extension are kept.
    ///
    /// Missing grade folders are skipped. Unreadable folders and entries are
    /// logged and skipped, so one bad entry never hides the rest of the tree.
    #[must_use]
    pub fn discover(input_root: &Path, output_root: &Path) -> Self {
        let mut job = Self::default();

        for grade in Grade::DATASET_ORDER {
            let folder = grade.folder_name();
            let source_dir = input_root.join(folder);
            if !source_dir.is_dir() {
                tracing::debug!("No {folder} folder under {}", input_root.display());
                continue;
            }

            let dest_dir = output_root.join(folder);
            if let Err(err) = fs::create_dir_all(&dest_dir) {
                // Files in this folder will fail individually when written.
                tracing::warn!("Could not create {}: {err}", dest_dir.display());
            }

            let entries = match fs::read_dir(&source_dir) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!("Could not read {}: {err}", source_dir.display());
                    continue;
                }
            };

            let sources = image_sources(entries.map(|entry| entry.map(|e| e.path())));

            tracing::debug!("{folder}: {} images", sources.len());
            job.per_grade.push((grade, sources.len()));
            job.items.extend(sources.into_iter().filter_map(|source| {
                let name = source.file_name()?.to_owned();
                Some(WorkItem {
                    destination: dest_dir.join(name),
                    source,
                    grade,
                })
            }));
        }

        job
    }

    /// Work items in discovery order.
    #[must_use]
    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    /// Discovered image count per present grade folder.
    #[must_use]
    pub fn per_grade(&self) -> &[(Grade, usize)] {
        &self.per_grade
    }

    /// Total number of discovered images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no images were discovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Sorted image files among `entries`, warning about entries that fail.
fn image_sources<I>(entries: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = io::Result<PathBuf>>,
{
    let mut sources = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() && has_image_extension(&path) => sources.push(path),
            Ok(_) => {}
            Err(err) => tracing::warn!("Skipping unreadable directory entry: {err}"),
        }
    }
    sources.sort();
    sources
}
