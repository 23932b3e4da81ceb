use std::path::PathBuf;

use anyhow::Result;

use crate::analysis::Analyzer;
use crate::config::RunConfig;
use crate::data::enumerate::{ensure_dir, list_files};
use crate::data::loader::load_trace;
use crate::error::AnalysisError;
use crate::render::{figure, FigureSink, FileJob};

// ---------------------------------------------------------------------------
// Batch outcome
// ---------------------------------------------------------------------------

/// A file the batch gave up on, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: String,
}

/// Everything a finished batch produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Images written, in processing order.
    pub written: Vec<PathBuf>,
    pub skipped: Vec<Skipped>,
    /// Output directory of each enumerated input directory.
    pub output_dirs: Vec<PathBuf>,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.written.len() + self.skipped.len()
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Run the whole batch described by `config`, handing figures to `sink`.
///
/// Files are handled one at a time: parse, analyze, render, write. A file
/// that fails for any reason is logged and recorded in
/// [`BatchReport::skipped`]; the batch continues. Only a missing input
/// directory or an invalid configuration aborts the run.
pub fn run_batch(config: &RunConfig, sink: &mut dyn FigureSink) -> Result<BatchReport> {
    config.validate()?;

    let mut analyzer = Analyzer::new(config);
    let mut report = BatchReport::default();

    for (subfolder, dir) in config.input_dirs() {
        let files = list_files(&dir, &config.extension)?;

        let output_dir = config.output.location.resolve(&dir);
        for d in figure::output_dirs(config, &output_dir) {
            ensure_dir(&d)?;
        }
        log::info!("Reading {} → {}", dir.display(), output_dir.display());

        for path in files {
            let job = FileJob {
                path,
                subfolder: subfolder.clone(),
                output_dir: output_dir.clone(),
            };
            match process_file(config, &mut analyzer, &job, sink) {
                Ok(paths) => {
                    for p in &paths {
                        log::info!("Saved {}", p.display());
                    }
                    report.written.extend(paths);
                }
                Err(e) => {
                    match e.downcast_ref::<AnalysisError>() {
                        Some(known) => {
                            log::warn!("Skipping {}: {known}", job.path.display())
                        }
                        None => log::error!("Error processing {}: {e:#}", job.path.display()),
                    }
                    report.skipped.push(Skipped {
                        path: job.path,
                        reason: format!("{e:#}"),
                    });
                }
            }
        }

        report.output_dirs.push(output_dir);
    }

    Ok(report)
}

/// Parse → analyze → render for one file. Returns the images written.
fn process_file(
    config: &RunConfig,
    analyzer: &mut Analyzer,
    job: &FileJob,
    sink: &mut dyn FigureSink,
) -> Result<Vec<PathBuf>> {
    let (trace, stats) = load_trace(&job.path, &config.format)?;
    if stats.malformed > 0 || stats.duplicates > 0 {
        log::debug!(
            "{}: kept {} of {} rows ({} malformed, {} duplicate x)",
            job.path.display(),
            stats.kept,
            stats.read,
            stats.malformed,
            stats.duplicates
        );
    }

    let analysis = analyzer.analyze(trace)?;

    let mut written = Vec::new();
    for fig in figure::build(config, job, &analysis) {
        sink.render(&fig)?;
        written.push(fig.path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::render::Figure;
    use std::f64::consts::PI;
    use std::path::Path;

    /// Keeps figures instead of drawing them.
    #[derive(Default)]
    struct Recorder {
        figures: Vec<Figure>,
    }

    impl FigureSink for Recorder {
        fn render(&mut self, figure: &Figure) -> Result<()> {
            self.figures.push(figure.clone());
            Ok(())
        }
    }

    /// 13 header lines, then 20 rows: 0–1 GHz, a cosine in dB peaking at row 10.
    fn write_vna_export(path: &Path) {
        let mut text = String::new();
        for i in 0..13 {
            text.push_str(&format!("!header line {i},,\n"));
        }
        for i in 0..20 {
            let freq = i as f64 * 1e9 / 19.0;
            let power = -20.0 + 10.0 * (PI * (i as f64 - 10.0) / 10.0).cos();
            text.push_str(&format!("{freq:.6e},{power:.6}\n"));
        }
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_vna_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write_vna_export(&dir.path().join("Notch.csv"));

        let cfg = RunConfig::preset(Mode::VnaPeaks, dir.path());
        let mut sink = Recorder::default();
        let report = run_batch(&cfg, &mut sink).unwrap();

        let out = dir.path().join("vna_plot");
        assert!(out.is_dir());
        assert_eq!(report.written, vec![out.join("Notch.png")]);
        assert!(report.skipped.is_empty());

        assert_eq!(sink.figures.len(), 1);
        let markers = &sink.figures[0].panels[0].markers;
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].label.as_deref(), Some("0.5263 GHz"));
        assert!((markers[0].y - -10.0).abs() < 1e-6);
    }

    #[test]
    fn test_insufficient_file_is_skipped_and_batch_continues() {
        let dir = tempfile::tempdir().unwrap();
        write_vna_export(&dir.path().join("good.csv"));

        let mut short = String::new();
        for _ in 0..13 {
            short.push_str("header\n");
        }
        short.push_str("1e9,-3.0\nfreq,power\n");
        std::fs::write(dir.path().join("short.csv"), short).unwrap();

        let cfg = RunConfig::preset(Mode::VnaPeaks, dir.path());
        let mut sink = Recorder::default();
        let report = run_batch(&cfg, &mut sink).unwrap();

        assert_eq!(report.processed(), 2);
        assert_eq!(report.written.len(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].path.ends_with("short.csv"));
        assert!(report.skipped[0].reason.contains("not enough data points"));
        assert!(sink.figures.iter().all(|f| !f.path.ends_with("short.png")));
    }

    #[test]
    fn test_missing_input_directory_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = RunConfig::preset(Mode::Trace, dir.path().join("absent"));
        let err = run_batch(&cfg, &mut Recorder::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::NotFound(_))
        ));
    }

    #[test]
    fn test_rerun_produces_identical_figures() {
        let dir = tempfile::tempdir().unwrap();
        write_vna_export(&dir.path().join("a.csv"));
        write_vna_export(&dir.path().join("b.csv"));
        let cfg = RunConfig::preset(Mode::VnaPeaks, dir.path());

        let mut first = Recorder::default();
        let mut second = Recorder::default();
        run_batch(&cfg, &mut first).unwrap();
        run_batch(&cfg, &mut second).unwrap();

        let sorted = |mut v: Vec<Figure>| {
            v.sort_by(|a, b| a.path.cmp(&b.path));
            v
        };
        assert_eq!(sorted(first.figures), sorted(second.figures));
    }

    #[test]
    fn test_subfolders_prefix_output_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = RunConfig::preset(Mode::FftPeak, dir.path());
        cfg.subfolders = vec!["master_amp".into(), "slave_no".into()];

        for sub in &cfg.subfolders {
            let sub_dir = dir.path().join(sub);
            std::fs::create_dir(&sub_dir).unwrap();
            let mut text = String::from("Time (s),Channel A (V)\n");
            for i in 0..256 {
                let t = i as f64 * 1e-10;
                let v = (2.0 * PI * 312.5e6 * t).sin();
                text.push_str(&format!("{t:e},{v}\n"));
            }
            std::fs::write(sub_dir.join("capture.csv"), text).unwrap();
        }

        let mut sink = Recorder::default();
        let report = run_batch(&cfg, &mut sink).unwrap();
        assert_eq!(
            report.written,
            vec![
                dir.path().join("master_amp/master_amp_capture_Time_Frequency_interference.png"),
                dir.path().join("slave_no/slave_no_capture_Time_Frequency_interference.png"),
            ]
        );
        assert_eq!(report.output_dirs.len(), 2);
    }

    /// 1000-sample linear ramp, 0 to 1 V at 1 GS/s. Its spectrum only falls
    /// away from DC, so it has no interior local maximum.
    fn write_ramp_capture(path: &Path) {
        let mut text = String::from("Time (s),Voltage (V)\n");
        for i in 0..1000 {
            let t = i as f64 * 1e-9;
            let v = i as f64 / 999.0;
            text.push_str(&format!("{t:e},{v}\n"));
        }
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_ramp_capture_is_plotted_in_spectral_modes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ramp");
        std::fs::create_dir(&input).unwrap();
        write_ramp_capture(&input.join("cap.csv"));

        let cfg = RunConfig::preset(Mode::FftTopN, &input);
        let mut sink = Recorder::default();
        let report = run_batch(&cfg, &mut sink).unwrap();
        assert!(report.skipped.is_empty(), "{:?}", report.skipped);
        assert_eq!(
            report.written,
            vec![dir.path().join("ramp_plot/cap_Time_Frequency_interference.png")]
        );
        let note = &sink.figures[0].panels[1].note;
        assert_eq!(note.len(), 5);
        assert!(note[0].starts_with("1.000 MHz, "), "{note:?}");

        let mut cfg = RunConfig::preset(Mode::FftPeak, &input);
        cfg.subfolders.clear();
        let mut sink = Recorder::default();
        let report = run_batch(&cfg, &mut sink).unwrap();
        assert!(report.skipped.is_empty(), "{:?}", report.skipped);
        assert_eq!(report.written, vec![input.join("cap_Time_Frequency_interference.png")]);
        let markers = &sink.figures[0].panels[1].markers;
        assert_eq!(markers.len(), 1);
        assert!((markers[0].x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config_rejected_before_io() {
        let mut cfg = RunConfig::preset(Mode::VnaPeaks, "/nonexistent");
        cfg.peaks.distance = 0;
        let err = run_batch(&cfg, &mut Recorder::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AnalysisError>(),
            Some(AnalysisError::InvalidConfig(_))
        ));
    }
}
