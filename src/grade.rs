//! Diabetic-retinopathy severity taxonomy.

use std::fmt;

/// One of the five severity grades.
///
/// Two orderings matter: the classifier emits scores in
/// [`Grade::CLASSIFIER_ORDER`], while labelled datasets on disk are laid out
/// as one folder per grade and enumerated in [`Grade::DATASET_ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    NoDr,
    Mild,
    Moderate,
    Severe,
    Proliferative,
}

impl Grade {
    /// Index order of the classifier's output scores.
    pub const CLASSIFIER_ORDER: [Self; 5] = [
        Self::NoDr,
        Self::Mild,
        Self::Moderate,
        Self::Severe,
        Self::Proliferative,
    ];

    /// Order in which dataset subfolders are scanned.
    pub const DATASET_ORDER: [Self; 5] = [
        Self::Mild,
        Self::Moderate,
        Self::NoDr,
        Self::Proliferative,
        Self::Severe,
    ];

    /// Subfolder name used by labelled datasets.
    ///
    /// These literals are part of the on-disk contract; existing datasets
    /// are organized with exactly these names.
    #[must_use]
    pub const fn folder_name(self) -> &'static str {
        match self {
            Self::NoDr => "No_DR",
            Self::Mild => "Mild",
            Self::Moderate => "Moderate",
            Self::Severe => "Severe",
            Self::Proliferative => "Proliferate_DR",
        }
    }

    /// Human-readable class name reported by predictions.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::NoDr => "No DR",
            Self::Mild => "Mild",
            Self::Moderate => "Moderate",
            Self::Severe => "Severe",
            Self::Proliferative => "Proliferative DR",
        }
    }

    /// Grade for a classifier output index.
    #[must_use]
    pub fn from_class_index(index: usize) -> Option<Self> {
        Self::CLASSIFIER_ORDER.get(index).copied()
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
