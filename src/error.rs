use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Analysis error kinds
// ---------------------------------------------------------------------------

/// Failure kinds the pipeline distinguishes.
///
/// `NotFound` aborts the run. Every other kind skips the current file and the
/// batch moves on. Malformed rows never surface here: the loader drops and
/// counts them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("input directory not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("not enough data points ({rows} valid rows, need at least 2)")]
    InsufficientData { rows: usize },

    #[error("sample interval is zero")]
    ZeroSpacing,

    #[error("no peaks satisfy the prominence/distance thresholds")]
    NoPeaks,

    #[error("global maximum at index {index} is not among the detected peaks")]
    GlobalMaxNotInPeaks { index: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AnalysisError {
    /// Whether the error should stop the whole batch rather than one file.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AnalysisError::NotFound(_) | AnalysisError::InvalidConfig(_))
    }
}
