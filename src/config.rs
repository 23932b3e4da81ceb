use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// Mode – which analysis a run performs
// ---------------------------------------------------------------------------

/// Analysis mode. Each variant has a preset reproducing one instrument
/// workflow; see [`RunConfig::preset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Plain trace plot (VNA export), y axis padded to whole dB.
    Trace,
    /// Time domain + FFT of two channels (slave vs local oscillator).
    FftDual,
    /// Time domain + FFT, strongest spectral peaks listed in a legend.
    FftTopN,
    /// Time domain + FFT, strongest non-DC peak marked, one run per subfolder.
    FftPeak,
    /// VNA trace with the largest peaks marked in GHz.
    VnaPeaks,
    /// OSA trace, global maximum and its neighbouring peaks; full and zoomed views.
    OsaNeighbors,
}

impl Mode {
    /// Whether the mode transforms the trace into a spectrum.
    pub fn is_spectral(self) -> bool {
        matches!(self, Mode::FftDual | Mode::FftTopN | Mode::FftPeak)
    }
}

// ---------------------------------------------------------------------------
// Input format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    Comma,
    /// Runs of spaces and tabs.
    Whitespace,
}

/// A y column and the label its series is drawn with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRole {
    pub column: usize,
    pub label: String,
}

/// Explicit column assignment; nothing is inferred from position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRoles {
    pub x: usize,
    pub y: Vec<ChannelRole>,
}

impl ColumnRoles {
    fn single(label: &str) -> Self {
        ColumnRoles {
            x: 0,
            y: vec![ChannelRole { column: 1, label: label.to_string() }],
        }
    }
}

/// How one instrument lays out its export file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceFormat {
    /// Leading lines to discard. A format constant, never inferred.
    pub skip_rows: usize,
    pub delimiter: Delimiter,
    pub columns: ColumnRoles,
    /// Keep only the first row for each x value.
    #[serde(default)]
    pub dedup_x: bool,
}

// ---------------------------------------------------------------------------
// Analysis settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrequencyUnit {
    #[serde(rename = "Hz")]
    Hz,
    #[serde(rename = "MHz")]
    MHz,
    #[serde(rename = "GHz")]
    GHz,
}

impl FrequencyUnit {
    pub fn divisor(self) -> f64 {
        match self {
            FrequencyUnit::Hz => 1.0,
            FrequencyUnit::MHz => 1e6,
            FrequencyUnit::GHz => 1e9,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            FrequencyUnit::Hz => "Hz",
            FrequencyUnit::MHz => "MHz",
            FrequencyUnit::GHz => "GHz",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum PeakSelection {
    None,
    /// The `n` highest accepted peaks, in rank order.
    TopN { n: usize },
    /// The `n` largest samples after the first, in rank order. No local
    /// maximum test: any spectrum bin above DC is a candidate.
    TopBins { n: usize },
    /// The global maximum plus up to `each_side` accepted peaks on either side.
    NeighborWindow { each_side: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakSettings {
    pub prominence: Option<f64>,
    /// Minimum index distance between accepted peaks (1 = unconstrained).
    pub distance: usize,
    pub selection: PeakSelection,
}

impl PeakSettings {
    pub fn none() -> Self {
        PeakSettings { prominence: None, distance: 1, selection: PeakSelection::None }
    }
}

// ---------------------------------------------------------------------------
// Rendering settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AxisRange {
    /// Data extent.
    Auto,
    Fixed { min: f64, max: f64 },
    /// `floor(min) - pad ..= ceil(max) + pad`, gridlines every whole unit.
    PaddedDb { pad: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LegendPosition {
    UpperRight,
    LowerRight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSettings {
    /// Range of the main (trace or spectrum) panel.
    pub x: AxisRange,
    pub y: AxisRange,
    /// Multiplier applied to x values before drawing (e.g. Hz → GHz).
    #[serde(default = "unit_scale")]
    pub x_scale: f64,
}

fn unit_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Labels {
    /// Fixed title; when absent the title is derived from the file name.
    #[serde(default)]
    pub title: Option<String>,
    pub x: String,
    pub y: String,
    /// Axis labels of the time-domain panel in spectral modes.
    #[serde(default)]
    pub time_x: String,
    #[serde(default)]
    pub time_y: String,
    /// Caption tail of the frequency panel, e.g. "Frequency Domain (Up to 500 MHz)".
    #[serde(default)]
    pub spectrum_caption: String,
    #[serde(default)]
    pub legend: Option<LegendPosition>,
}

/// Where images go relative to the directory being read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum OutputLocation {
    /// `<parent>/<input name><suffix>`, e.g. `ramp` → `ramp_plot`.
    Sibling { suffix: String },
    /// `<input>/<name>`.
    Inside { name: String },
    /// Next to the input files.
    SameAsInput,
    Explicit { path: PathBuf },
}

impl OutputLocation {
    pub fn resolve(&self, input_dir: &Path) -> PathBuf {
        match self {
            OutputLocation::Sibling { suffix } => {
                let name = input_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "output".to_string());
                let parent = input_dir.parent().unwrap_or_else(|| Path::new(""));
                parent.join(format!("{name}{suffix}"))
            }
            OutputLocation::Inside { name } => input_dir.join(name),
            OutputLocation::SameAsInput => input_dir.to_path_buf(),
            OutputLocation::Explicit { path } => path.clone(),
        }
    }
}

/// File naming of one rendered view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewNaming {
    /// Subdirectory of the output directory, if any.
    #[serde(default)]
    pub subdir: Option<String>,
    #[serde(default)]
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputNaming {
    pub location: OutputLocation,
    pub main: ViewNaming,
    /// Prefix image names with the subfolder they came from.
    #[serde(default)]
    pub prefix_subfolder: bool,
}

/// Extra view centred on the global maximum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoomView {
    pub half_width: f64,
    pub naming: ViewNaming,
}

// ---------------------------------------------------------------------------
// RunConfig
// ---------------------------------------------------------------------------

/// Everything one batch run needs. Nothing in the pipeline reads global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub mode: Mode,
    pub input_dir: PathBuf,
    /// Subdirectories of `input_dir` processed in turn; empty = `input_dir` itself.
    #[serde(default)]
    pub subfolders: Vec<String>,
    pub extension: String,
    pub format: TraceFormat,
    /// Unit of the spectrum's frequency axis; `None` for non-spectral modes.
    #[serde(default)]
    pub spectrum: Option<FrequencyUnit>,
    pub peaks: PeakSettings,
    pub axes: AxisSettings,
    pub labels: Labels,
    pub output: OutputNaming,
    #[serde(default)]
    pub zoom: Option<ZoomView>,
    /// Image size in pixels.
    pub size: (u32, u32),
}

impl RunConfig {
    /// Stock configuration for `mode`, matching the instrument workflow it is named after.
    pub fn preset(mode: Mode, input_dir: impl Into<PathBuf>) -> Self {
        let input_dir = input_dir.into();
        match mode {
            Mode::Trace => RunConfig {
                mode,
                input_dir,
                subfolders: Vec::new(),
                extension: "csv".into(),
                format: TraceFormat {
                    skip_rows: 13,
                    delimiter: Delimiter::Comma,
                    columns: ColumnRoles::single("Power"),
                    dedup_x: false,
                },
                spectrum: None,
                peaks: PeakSettings::none(),
                axes: AxisSettings {
                    x: AxisRange::Auto,
                    y: AxisRange::PaddedDb { pad: 1.0 },
                    x_scale: 1.0,
                },
                labels: Labels {
                    title: None,
                    x: "Frequency (Hz)".into(),
                    y: "Power (dB)".into(),
                    time_x: String::new(),
                    time_y: String::new(),
                    spectrum_caption: String::new(),
                    legend: None,
                },
                output: OutputNaming {
                    location: OutputLocation::Sibling { suffix: "_plot".into() },
                    main: ViewNaming { subdir: None, suffix: String::new() },
                    prefix_subfolder: false,
                },
                zoom: None,
                size: (640, 480),
            },
            Mode::FftDual => RunConfig {
                mode,
                input_dir,
                subfolders: Vec::new(),
                extension: "csv".into(),
                format: TraceFormat {
                    skip_rows: 10,
                    delimiter: Delimiter::Comma,
                    columns: ColumnRoles {
                        x: 0,
                        y: vec![
                            ChannelRole { column: 1, label: "slave Signal".into() },
                            ChannelRole { column: 2, label: "Local Oscillator Signal".into() },
                        ],
                    },
                    dedup_x: false,
                },
                spectrum: Some(FrequencyUnit::MHz),
                peaks: PeakSettings::none(),
                axes: AxisSettings {
                    x: AxisRange::Fixed { min: 0.0, max: 3000.0 },
                    y: AxisRange::Fixed { min: 0.0, max: 0.1 },
                    x_scale: 1.0,
                },
                labels: spectral_labels("Amplitude (V)", "Frequency Domain", true),
                output: OutputNaming {
                    location: OutputLocation::Sibling { suffix: "_plot".into() },
                    main: ViewNaming { subdir: None, suffix: "_Time_Frequency_slave".into() },
                    prefix_subfolder: false,
                },
                zoom: None,
                size: (1000, 600),
            },
            Mode::FftTopN => RunConfig {
                mode,
                input_dir,
                subfolders: Vec::new(),
                extension: "csv".into(),
                format: TraceFormat {
                    skip_rows: 1,
                    delimiter: Delimiter::Comma,
                    columns: ColumnRoles::single("Voltage"),
                    dedup_x: true,
                },
                spectrum: Some(FrequencyUnit::MHz),
                peaks: PeakSettings {
                    prominence: None,
                    distance: 1,
                    selection: PeakSelection::TopBins { n: 5 },
                },
                axes: AxisSettings {
                    x: AxisRange::Fixed { min: 0.0, max: 500.0 },
                    y: AxisRange::Fixed { min: 0.0, max: 100.0 },
                    x_scale: 1.0,
                },
                labels: spectral_labels(
                    "Voltage (V)",
                    "Frequency Domain (Up to 500 MHz)",
                    false,
                ),
                output: OutputNaming {
                    location: OutputLocation::Sibling { suffix: "_plot".into() },
                    main: ViewNaming {
                        subdir: None,
                        suffix: "_Time_Frequency_interference".into(),
                    },
                    prefix_subfolder: false,
                },
                zoom: None,
                size: (1000, 600),
            },
            Mode::FftPeak => RunConfig {
                mode,
                input_dir,
                subfolders: ["master_amp", "master_no", "slave_amp", "slave_no"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                extension: "csv".into(),
                format: TraceFormat {
                    skip_rows: 1,
                    delimiter: Delimiter::Comma,
                    columns: ColumnRoles::single("Interference Signal"),
                    dedup_x: true,
                },
                spectrum: Some(FrequencyUnit::MHz),
                peaks: PeakSettings {
                    prominence: None,
                    distance: 1,
                    selection: PeakSelection::TopBins { n: 1 },
                },
                axes: AxisSettings {
                    x: AxisRange::Fixed { min: 0.0, max: 7500.0 },
                    y: AxisRange::Auto,
                    x_scale: 1.0,
                },
                labels: spectral_labels(
                    "Voltage (V)",
                    "Frequency Domain (Up to 7.5 GHz)",
                    true,
                ),
                output: OutputNaming {
                    location: OutputLocation::SameAsInput,
                    main: ViewNaming {
                        subdir: None,
                        suffix: "_Time_Frequency_interference".into(),
                    },
                    prefix_subfolder: true,
                },
                zoom: None,
                size: (1000, 600),
            },
            Mode::VnaPeaks => RunConfig {
                mode,
                input_dir,
                subfolders: Vec::new(),
                extension: "csv".into(),
                format: TraceFormat {
                    skip_rows: 13,
                    delimiter: Delimiter::Comma,
                    columns: ColumnRoles::single("Power"),
                    dedup_x: false,
                },
                spectrum: None,
                peaks: PeakSettings {
                    prominence: None,
                    distance: 1000,
                    selection: PeakSelection::TopN { n: 3 },
                },
                axes: AxisSettings {
                    x: AxisRange::Auto,
                    y: AxisRange::Auto,
                    x_scale: 1e-9,
                },
                labels: Labels {
                    title: None,
                    x: "Frequency (GHz)".into(),
                    y: "Power (dB)".into(),
                    time_x: String::new(),
                    time_y: String::new(),
                    spectrum_caption: String::new(),
                    legend: Some(LegendPosition::LowerRight),
                },
                output: OutputNaming {
                    location: OutputLocation::Inside { name: "vna_plot".into() },
                    main: ViewNaming { subdir: None, suffix: String::new() },
                    prefix_subfolder: false,
                },
                zoom: None,
                size: (640, 480),
            },
            Mode::OsaNeighbors => RunConfig {
                mode,
                input_dir,
                subfolders: Vec::new(),
                extension: "txt".into(),
                format: TraceFormat {
                    skip_rows: 153,
                    delimiter: Delimiter::Whitespace,
                    columns: ColumnRoles::single("Power vs Wavelength"),
                    dedup_x: false,
                },
                spectrum: None,
                peaks: PeakSettings {
                    prominence: Some(5.0),
                    distance: 5,
                    selection: PeakSelection::NeighborWindow { each_side: 2 },
                },
                axes: AxisSettings {
                    x: AxisRange::Auto,
                    y: AxisRange::Auto,
                    x_scale: 1.0,
                },
                labels: Labels {
                    title: None,
                    x: "Wavelength (nm)".into(),
                    y: "Power (dB)".into(),
                    time_x: String::new(),
                    time_y: String::new(),
                    spectrum_caption: String::new(),
                    legend: None,
                },
                output: OutputNaming {
                    location: OutputLocation::SameAsInput,
                    main: ViewNaming { subdir: Some("full".into()), suffix: "_full".into() },
                    prefix_subfolder: false,
                },
                zoom: Some(ZoomView {
                    half_width: 1.0,
                    naming: ViewNaming { subdir: Some("zoom".into()), suffix: "_zoom".into() },
                }),
                size: (640, 480),
            },
        }
    }

    /// Load a complete configuration from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: RunConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot honour.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let invalid = |msg: String| Err(AnalysisError::InvalidConfig(msg));

        if self.format.columns.y.is_empty() {
            return invalid("at least one y column is required".into());
        }
        if self.peaks.distance == 0 {
            return invalid("peak distance must be at least 1".into());
        }
        if let Some(p) = self.peaks.prominence {
            if !(p.is_finite() && p >= 0.0) {
                return invalid(format!("prominence must be a non-negative number, got {p}"));
            }
        }
        match self.peaks.selection {
            PeakSelection::TopN { n: 0 } | PeakSelection::TopBins { n: 0 } => {
                return invalid("top-n selection needs n >= 1".into())
            }
            PeakSelection::NeighborWindow { .. } if self.mode.is_spectral() => {
                return invalid("neighbor-window selection applies to traces only".into())
            }
            _ => {}
        }
        match (self.mode.is_spectral(), self.spectrum) {
            (true, None) => {
                return invalid(format!("mode {:?} needs a spectrum unit", self.mode))
            }
            (false, Some(_)) => {
                return invalid(format!("mode {:?} plots the trace, not a spectrum", self.mode))
            }
            _ => {}
        }
        for (axis, range) in [("x", self.axes.x), ("y", self.axes.y)] {
            if let AxisRange::Fixed { min, max } = range {
                if !(min < max) {
                    return invalid(format!("{axis} range {min}..{max} is empty"));
                }
            }
        }
        if !(self.axes.x_scale.is_finite() && self.axes.x_scale != 0.0) {
            return invalid("x_scale must be finite and non-zero".into());
        }
        if let Some(zoom) = &self.zoom {
            if !(zoom.half_width > 0.0) {
                return invalid("zoom half width must be positive".into());
            }
        }
        if self.size.0 == 0 || self.size.1 == 0 {
            return invalid("image size must be non-zero".into());
        }
        Ok(())
    }

    /// Directories to enumerate, paired with the subfolder name when there is one.
    pub fn input_dirs(&self) -> Vec<(Option<String>, PathBuf)> {
        if self.subfolders.is_empty() {
            vec![(None, self.input_dir.clone())]
        } else {
            self.subfolders
                .iter()
                .map(|s| (Some(s.clone()), self.input_dir.join(s)))
                .collect()
        }
    }
}

fn spectral_labels(time_y: &str, caption: &str, legend: bool) -> Labels {
    Labels {
        title: None,
        x: "Frequency (MHz)".into(),
        y: "Amplitude".into(),
        time_x: "Time (s)".into(),
        time_y: time_y.into(),
        spectrum_caption: caption.into(),
        legend: legend.then_some(LegendPosition::UpperRight),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for &mode in Mode::value_variants() {
            let cfg = RunConfig::preset(mode, "data");
            assert_eq!(cfg.mode, mode);
            cfg.validate().unwrap_or_else(|e| panic!("{mode:?}: {e}"));
        }
    }

    #[test]
    fn test_preset_header_skip_counts() {
        let skip = |m| RunConfig::preset(m, "d").format.skip_rows;
        assert_eq!(skip(Mode::Trace), 13);
        assert_eq!(skip(Mode::VnaPeaks), 13);
        assert_eq!(skip(Mode::FftDual), 10);
        assert_eq!(skip(Mode::FftTopN), 1);
        assert_eq!(skip(Mode::FftPeak), 1);
        assert_eq!(skip(Mode::OsaNeighbors), 153);
    }

    #[test]
    fn test_output_location_resolution() {
        let input = Path::new("runs/1116/ramp");
        let sib = OutputLocation::Sibling { suffix: "_plot".into() };
        assert_eq!(sib.resolve(input), PathBuf::from("runs/1116/ramp_plot"));

        let inside = OutputLocation::Inside { name: "vna_plot".into() };
        assert_eq!(inside.resolve(input), PathBuf::from("runs/1116/ramp/vna_plot"));

        assert_eq!(OutputLocation::SameAsInput.resolve(input), input.to_path_buf());
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut cfg = RunConfig::preset(Mode::VnaPeaks, "d");
        cfg.peaks.distance = 0;
        assert!(matches!(cfg.validate(), Err(AnalysisError::InvalidConfig(_))));

        let mut cfg = RunConfig::preset(Mode::FftTopN, "d");
        cfg.axes.x = AxisRange::Fixed { min: 10.0, max: 10.0 };
        assert!(cfg.validate().is_err());

        let mut cfg = RunConfig::preset(Mode::FftTopN, "d");
        cfg.peaks.selection = PeakSelection::NeighborWindow { each_side: 2 };
        assert!(cfg.validate().is_err());

        let mut cfg = RunConfig::preset(Mode::Trace, "d");
        cfg.format.columns.y.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = RunConfig::preset(Mode::FftPeak, "d");
        cfg.peaks.selection = PeakSelection::TopBins { n: 0 };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_spectrum_on_trace_modes() {
        for mode in [Mode::Trace, Mode::VnaPeaks, Mode::OsaNeighbors] {
            let mut cfg = RunConfig::preset(mode, "d");
            cfg.spectrum = Some(FrequencyUnit::MHz);
            assert!(
                matches!(cfg.validate(), Err(AnalysisError::InvalidConfig(_))),
                "{mode:?} accepted a spectrum unit"
            );
        }

        let mut cfg = RunConfig::preset(Mode::FftDual, "d");
        cfg.spectrum = None;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_spectral_presets_rank_every_bin() {
        assert_eq!(
            RunConfig::preset(Mode::FftTopN, "d").peaks.selection,
            PeakSelection::TopBins { n: 5 }
        );
        assert_eq!(
            RunConfig::preset(Mode::FftPeak, "d").peaks.selection,
            PeakSelection::TopBins { n: 1 }
        );
    }

    #[test]
    fn test_json_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("osa.json");
        let preset = RunConfig::preset(Mode::OsaNeighbors, "spectra/osa");
        std::fs::write(&path, serde_json::to_string_pretty(&preset).unwrap()).unwrap();

        let loaded = RunConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, preset);
        assert!(serde_json::to_string(&preset).unwrap().contains("\"neighbor-window\""));
    }

    #[test]
    fn test_input_dirs_with_subfolders() {
        let cfg = RunConfig::preset(Mode::FftPeak, "osc");
        let dirs = cfg.input_dirs();
        assert_eq!(dirs.len(), 4);
        assert_eq!(dirs[0], (Some("master_amp".to_string()), PathBuf::from("osc/master_amp")));

        let cfg = RunConfig::preset(Mode::Trace, "vna");
        assert_eq!(cfg.input_dirs(), vec![(None, PathBuf::from("vna"))]);
    }
}
