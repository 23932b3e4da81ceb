//! Trace Analysis
//!
//! Turns a cleaned [`Trace`] into what the renderer draws: the trace itself,
//! optionally its magnitude spectrum, and the selected peaks.
//!
//! ```text
//!   Trace ──► SpectrumAnalyzer (spectral modes) ──► PeakFinder ──► Analysis
//!     └───────────────────────────────────────────────┘
//! ```

pub mod peaks;
pub mod spectrum;

pub use peaks::PeakFinder;
pub use spectrum::SpectrumAnalyzer;

use crate::config::RunConfig;
use crate::data::model::{PeakSet, Spectrum, Trace};
use crate::error::AnalysisError;

/// Result of analysing one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub trace: Trace,
    pub spectrum: Option<Spectrum>,
    /// Peaks of the spectrum's first channel in spectral modes, of the
    /// trace's first channel otherwise. Empty when the mode selects none.
    pub peaks: PeakSet,
}

/// Per-run analysis stage built once from the configuration.
pub struct Analyzer {
    spectrum: Option<SpectrumAnalyzer>,
    finder: PeakFinder,
    config: RunConfig,
}

impl Analyzer {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            spectrum: config.spectrum.map(SpectrumAnalyzer::new),
            finder: PeakFinder::from_settings(&config.peaks),
            config: config.clone(),
        }
    }

    pub fn analyze(&mut self, trace: Trace) -> Result<Analysis, AnalysisError> {
        let spectrum = match self.spectrum.as_mut() {
            Some(analyzer) => Some(analyzer.compute(&trace)?),
            None => None,
        };

        let selection = self.config.peaks.selection;
        let peaks = match &spectrum {
            Some(s) => self.finder.select(&s.frequency, s.primary(), selection)?,
            None => self.finder.select(&trace.x, trace.primary(), selection)?,
        };

        if !peaks.is_empty() {
            log::debug!(
                "{} peak(s): {}",
                peaks.len(),
                peaks
                    .peaks
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        Ok(Analysis { trace, spectrum, peaks })
    }
}
