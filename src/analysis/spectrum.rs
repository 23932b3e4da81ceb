//! Magnitude spectrum of a uniformly sampled trace
//!
//! Full-length complex DFT, no window, no 1/N scaling. Only the
//! non-negative half of the frequency axis is kept.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::config::FrequencyUnit;
use crate::data::model::{Spectrum, Trace};
use crate::error::AnalysisError;

/// FFT front end for traces.
pub struct SpectrumAnalyzer {
    unit: FrequencyUnit,
    planner: FftPlanner<f64>,
}

impl SpectrumAnalyzer {
    /// Create an analyzer reporting frequencies in `unit`.
    pub fn new(unit: FrequencyUnit) -> Self {
        Self {
            unit,
            planner: FftPlanner::new(),
        }
    }

    /// Transform every channel of `trace`.
    ///
    /// The sample interval is taken from the first two x values; the trace
    /// is assumed uniformly spaced beyond that. Output length is `N / 2`
    /// (rounded down).
    pub fn compute(&mut self, trace: &Trace) -> Result<Spectrum, AnalysisError> {
        let n = trace.len();
        let dt = match trace.sample_spacing() {
            Some(dt) if dt != 0.0 => dt,
            Some(_) => return Err(AnalysisError::ZeroSpacing),
            None => return Err(AnalysisError::InsufficientData { rows: n }),
        };

        let half = n / 2;
        let bin_width = 1.0 / (n as f64 * dt) / self.unit.divisor();
        let frequency = (0..half).map(|k| k as f64 * bin_width).collect();

        let fft = self.planner.plan_fft_forward(n);
        let magnitude = trace
            .channels
            .iter()
            .map(|channel| {
                let mut buffer: Vec<Complex<f64>> = channel
                    .values
                    .iter()
                    .map(|&v| Complex::new(v, 0.0))
                    .collect();
                fft.process(&mut buffer);
                buffer[..half].iter().map(|c| c.norm()).collect()
            })
            .collect();

        Ok(Spectrum { frequency, magnitude })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Channel;
    use std::f64::consts::PI;

    fn sine_trace(n: usize, dt: f64, freq: f64, amplitude: f64) -> Trace {
        let x: Vec<f64> = (0..n).map(|i| i as f64 * dt).collect();
        let values = x.iter().map(|t| amplitude * (2.0 * PI * freq * t).sin()).collect();
        Trace {
            x,
            channels: vec![Channel { label: "v".into(), values }],
        }
    }

    #[test]
    fn test_output_length_is_half() {
        let mut analyzer = SpectrumAnalyzer::new(FrequencyUnit::Hz);
        for n in [2usize, 3, 10, 11, 256, 1001] {
            let spectrum = analyzer.compute(&sine_trace(n, 1e-3, 50.0, 1.0)).unwrap();
            assert_eq!(spectrum.frequency.len(), n / 2, "n = {n}");
            assert_eq!(spectrum.primary().len(), n / 2);
            assert!(spectrum.primary().iter().all(|&m| m >= 0.0));
        }
    }

    #[test]
    fn test_tone_lands_in_expected_bin() {
        // 1 GS/s, 1000 samples → 1 MHz bins; 50 MHz tone → bin 50.
        let n = 1000;
        let trace = sine_trace(n, 1e-9, 50e6, 2.0);
        let mut analyzer = SpectrumAnalyzer::new(FrequencyUnit::MHz);
        let spectrum = analyzer.compute(&trace).unwrap();

        let (peak_bin, &peak_mag) = spectrum
            .primary()
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert_eq!(peak_bin, 50);
        assert!((spectrum.frequency[peak_bin] - 50.0).abs() < 1e-9);
        // Unnormalised: |X[k]| = A * N / 2 for a bin-centred sine.
        assert!((peak_mag - 2.0 * n as f64 / 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_dc_bin_is_sum() {
        let trace = Trace {
            x: vec![0.0, 1.0, 2.0, 3.0],
            channels: vec![
                Channel { label: "a".into(), values: vec![1.0, 1.0, 1.0, 1.0] },
                Channel { label: "b".into(), values: vec![0.5, -0.5, 0.5, -0.5] },
            ],
        };
        let spectrum = SpectrumAnalyzer::new(FrequencyUnit::Hz).compute(&trace).unwrap();
        assert_eq!(spectrum.frequency, vec![0.0, 0.25]);
        assert_eq!(spectrum.magnitude.len(), 2);
        assert!((spectrum.magnitude[0][0] - 4.0).abs() < 1e-12);
        assert!(spectrum.magnitude[1][0].abs() < 1e-12);
    }

    #[test]
    fn test_rejects_degenerate_traces() {
        let mut analyzer = SpectrumAnalyzer::new(FrequencyUnit::GHz);
        let one = Trace {
            x: vec![0.0],
            channels: vec![Channel { label: "v".into(), values: vec![1.0] }],
        };
        assert_eq!(
            analyzer.compute(&one),
            Err(AnalysisError::InsufficientData { rows: 1 })
        );

        let flat = Trace {
            x: vec![1.0, 1.0, 2.0],
            channels: vec![Channel { label: "v".into(), values: vec![1.0, 2.0, 3.0] }],
        };
        assert_eq!(analyzer.compute(&flat), Err(AnalysisError::ZeroSpacing));
    }
}
