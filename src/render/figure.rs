use std::ops::Range;
use std::path::{Path, PathBuf};

use plotters::style::RGBColor;

use crate::analysis::peaks::argmax;
use crate::analysis::Analysis;
use crate::color::series_colors;
use crate::config::{AxisRange, LegendPosition, Mode, RunConfig, ViewNaming};
use crate::data::model::{Peak, Trace};

// ---------------------------------------------------------------------------
// Figure description – everything the backend needs, nothing it decides
// ---------------------------------------------------------------------------

/// One image to write.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub path: PathBuf,
    pub size: (u32, u32),
    /// Stacked top to bottom.
    pub panels: Vec<Panel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_range: Range<f64>,
    pub x_ticks: TickFormat,
    pub y_range: Range<f64>,
    /// Fixed spacing of horizontal gridlines, when the axis demands one.
    pub y_step: Option<f64>,
    pub series: Vec<Series>,
    pub markers: Vec<Marker>,
    /// Text box in the upper right corner, one entry per line.
    pub note: Vec<String>,
    pub legend: Option<LegendPosition>,
}

/// How tick values along an axis are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickFormat {
    /// Backend default.
    #[default]
    Auto,
    /// Mantissa and exponent, two decimals (`2.50e-7`).
    Scientific,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub color: RGBColor,
}

/// Peak marker, optionally labelled right at the point.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub x: f64,
    pub y: f64,
    pub label: Option<String>,
}

/// Identity of the file being drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct FileJob {
    pub path: PathBuf,
    /// Subfolder of the input directory the file was found in.
    pub subfolder: Option<String>,
    pub output_dir: PathBuf,
}

impl FileJob {
    /// File name without extension.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Figures for one analysed file, in the order they should be written.
pub fn build(config: &RunConfig, job: &FileJob, analysis: &Analysis) -> Vec<Figure> {
    let main_path = output_path(config, job, &config.output.main);

    if config.mode.is_spectral() {
        return vec![Figure {
            path: main_path,
            size: config.size,
            panels: vec![
                time_panel(config, job, &analysis.trace),
                frequency_panel(config, job, analysis),
            ],
        }];
    }

    let full = trace_panel(config, job, analysis, None);
    let mut figures = vec![Figure {
        path: main_path,
        size: config.size,
        panels: vec![full],
    }];

    if let Some(zoom) = &config.zoom {
        let global = analysis
            .peaks
            .global_max
            .or_else(|| argmax(analysis.trace.primary()));
        if let Some(g) = global {
            let centre = analysis.trace.x[g] * config.axes.x_scale;
            let window = (centre - zoom.half_width)..(centre + zoom.half_width);
            figures.push(Figure {
                path: output_path(config, job, &zoom.naming),
                size: config.size,
                panels: vec![trace_panel(config, job, analysis, Some(window))],
            });
        }
    }

    figures
}

/// `<output>/<subdir>/<subfolder>_<stem><suffix>.png`
pub fn output_path(config: &RunConfig, job: &FileJob, view: &ViewNaming) -> PathBuf {
    let mut dir = job.output_dir.clone();
    if let Some(sub) = &view.subdir {
        dir.push(sub);
    }
    let prefix = match (&job.subfolder, config.output.prefix_subfolder) {
        (Some(s), true) => format!("{s}_"),
        _ => String::new(),
    };
    dir.join(format!("{prefix}{}{}.png", job.stem(), view.suffix))
}

/// Directory part of every path [`build`] may produce for `output_dir`.
pub fn output_dirs(config: &RunConfig, output_dir: &Path) -> Vec<PathBuf> {
    let mut dirs = vec![subdir(output_dir, &config.output.main)];
    if let Some(zoom) = &config.zoom {
        dirs.push(subdir(output_dir, &zoom.naming));
    }
    dirs.dedup();
    dirs
}

fn subdir(output_dir: &Path, view: &ViewNaming) -> PathBuf {
    match &view.subdir {
        Some(s) => output_dir.join(s),
        None => output_dir.to_path_buf(),
    }
}

fn title_prefix(job: &FileJob) -> String {
    job.subfolder
        .as_ref()
        .map(|s| format!("{s} - "))
        .unwrap_or_default()
}

fn time_panel(config: &RunConfig, job: &FileJob, trace: &Trace) -> Panel {
    let colors = series_colors(trace.channels.len());
    let series: Vec<Series> = trace
        .channels
        .iter()
        .enumerate()
        .map(|(i, ch)| Series {
            label: format!("{} (Time Domain)", ch.label),
            points: trace.points(i),
            color: colors[i],
        })
        .collect();

    let x_range = data_range(trace.x.iter().copied());
    let y_range = padded(data_range(series.iter().flat_map(|s| s.points.iter().map(|p| p.1))));

    Panel {
        title: format!("{}{} - Time Domain", title_prefix(job), job.stem()),
        x_label: config.labels.time_x.clone(),
        y_label: config.labels.time_y.clone(),
        x_range,
        // Sample times are nanoseconds expressed in seconds.
        x_ticks: TickFormat::Scientific,
        y_range,
        y_step: None,
        series,
        markers: Vec::new(),
        note: Vec::new(),
        legend: config.labels.legend,
    }
}

fn frequency_panel(config: &RunConfig, job: &FileJob, analysis: &Analysis) -> Panel {
    let Some(spectrum) = &analysis.spectrum else {
        return time_panel(config, job, &analysis.trace);
    };
    let unit = config.spectrum.map(|u| u.symbol()).unwrap_or("Hz");

    let x_range = resolve_x(config.axes.x, spectrum.frequency.iter().copied()).0;
    let colors = series_colors(spectrum.magnitude.len());
    let series: Vec<Series> = spectrum
        .magnitude
        .iter()
        .zip(&analysis.trace.channels)
        .enumerate()
        .map(|(i, (mag, ch))| {
            let points = spectrum.frequency.iter().copied().zip(mag.iter().copied()).collect();
            Series {
                label: format!("{} (Frequency Domain)", ch.label),
                points: clip_to_x(points, &x_range),
                color: colors[i],
            }
        })
        .collect();

    let (y_range, y_step) = resolve_y(
        config.axes.y,
        series.iter().flat_map(|s| s.points.iter().map(|p| p.1)),
    );

    let peaks = &analysis.peaks.peaks;
    let (markers, note) = match config.mode {
        Mode::FftTopN => (
            Vec::new(),
            peaks
                .iter()
                .map(|p| format!("{:.3} {unit}, {:.3}", p.x, p.y))
                .collect(),
        ),
        _ => (
            peaks
                .iter()
                .map(|p| Marker {
                    x: p.x,
                    y: p.y,
                    label: Some(format!("{:.3} {unit}, {:.3}", p.x, p.y)),
                })
                .collect(),
            Vec::new(),
        ),
    };

    Panel {
        title: format!(
            "{}{} - {}",
            title_prefix(job),
            job.stem(),
            config.labels.spectrum_caption
        ),
        x_label: config.labels.x.clone(),
        y_label: config.labels.y.clone(),
        x_range,
        x_ticks: TickFormat::Auto,
        y_range,
        y_step,
        series,
        markers,
        note,
        legend: config.labels.legend,
    }
}

/// Trace panel; `window` overrides the configured x range for zoomed views.
fn trace_panel(
    config: &RunConfig,
    job: &FileJob,
    analysis: &Analysis,
    window: Option<Range<f64>>,
) -> Panel {
    let trace = &analysis.trace;
    let scale = config.axes.x_scale;
    let xs = trace.x.iter().map(|x| x * scale);

    let x_range = match &window {
        Some(w) => w.clone(),
        None => resolve_x(config.axes.x, xs.clone()).0,
    };
    // The y extent follows the whole trace, also when zoomed.
    let (y_range, y_step) = resolve_y(config.axes.y, trace.primary().iter().copied());

    let base = job.stem();
    let (title, label) = match config.mode {
        Mode::VnaPeaks => (base.to_lowercase(), base.to_lowercase()),
        Mode::OsaNeighbors => {
            let view = if window.is_some() { "Zoomed In" } else { "Full Range" };
            (format!("{} Plot - {view}", job.file_name()), trace.channels[0].label.clone())
        }
        _ => (base, trace.channels[0].label.clone()),
    };
    let title = config.labels.title.clone().unwrap_or(title);

    let colors = series_colors(trace.channels.len());
    let series = trace
        .channels
        .iter()
        .enumerate()
        .map(|(i, ch)| Series {
            label: if i == 0 { label.clone() } else { ch.label.clone() },
            points: clip_to_x(
                xs.clone().zip(ch.values.iter().copied()).collect(),
                &x_range,
            ),
            color: colors[i],
        })
        .collect();

    let peaks: Vec<&Peak> = analysis
        .peaks
        .peaks
        .iter()
        .filter(|p| x_range.contains(&(p.x * scale)) || p.x * scale == x_range.end)
        .collect();

    let (markers, note) = match config.mode {
        Mode::VnaPeaks => {
            let unit = unit_for_scale(scale);
            let markers = peaks
                .iter()
                .map(|p| Marker {
                    x: p.x * scale,
                    y: p.y,
                    label: Some(format!("{:.4} {unit}", p.x * scale)),
                })
                .collect();
            (markers, Vec::new())
        }
        Mode::OsaNeighbors => {
            let markers = peaks
                .iter()
                .map(|p| Marker { x: p.x * scale, y: p.y, label: None })
                .collect();
            let note = analysis
                .peaks
                .peaks
                .iter()
                .enumerate()
                .map(|(i, p)| format!("{}: ({:.2} nm, {:.2} dB)", i + 1, p.x * scale, p.y))
                .collect();
            (markers, note)
        }
        _ => (Vec::new(), Vec::new()),
    };

    Panel {
        title,
        x_label: config.labels.x.clone(),
        y_label: config.labels.y.clone(),
        x_range,
        x_ticks: TickFormat::Auto,
        y_range,
        y_step,
        series,
        markers,
        note,
        legend: config.labels.legend,
    }
}

// ---------------------------------------------------------------------------
// Axis helpers
// ---------------------------------------------------------------------------

fn unit_for_scale(scale: f64) -> &'static str {
    if scale == 1e-9 {
        "GHz"
    } else if scale == 1e-6 {
        "MHz"
    } else if scale == 1e-3 {
        "kHz"
    } else {
        "Hz"
    }
}

/// Smallest and largest finite value; a degenerate extent is widened by 0.5.
fn data_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return 0.0..1.0;
    }
    if hi - lo < f64::EPSILON {
        return (lo - 0.5)..(hi + 0.5);
    }
    lo..hi
}

/// 5% headroom on both ends.
fn padded(range: Range<f64>) -> Range<f64> {
    let pad = (range.end - range.start) * 0.05;
    (range.start - pad)..(range.end + pad)
}

fn resolve_x(axis: AxisRange, values: impl Iterator<Item = f64>) -> (Range<f64>, Option<f64>) {
    match axis {
        AxisRange::Auto => (data_range(values), None),
        other => resolve_y(other, values),
    }
}

fn resolve_y(axis: AxisRange, values: impl Iterator<Item = f64>) -> (Range<f64>, Option<f64>) {
    match axis {
        AxisRange::Auto => (padded(data_range(values)), None),
        AxisRange::Fixed { min, max } => (min..max, None),
        AxisRange::PaddedDb { pad } => {
            let r = data_range(values);
            ((r.start.floor() - pad)..(r.end.ceil() + pad), Some(1.0))
        }
    }
}

/// Points inside `range`, plus the nearest point beyond each edge so the
/// line reaches the axis border.
fn clip_to_x(points: Vec<(f64, f64)>, range: &Range<f64>) -> Vec<(f64, f64)> {
    let inside = |x: f64| x >= range.start && x <= range.end;
    let Some(first) = points.iter().position(|p| inside(p.0)) else {
        return Vec::new();
    };
    let last = points.iter().rposition(|p| inside(p.0)).unwrap_or(first);
    let start = first.saturating_sub(1);
    let end = (last + 2).min(points.len());
    points[start..end].to_vec()
}
