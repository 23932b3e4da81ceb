//! Peak Detection
//!
//! Local maxima filtered by minimum spacing and prominence, followed by a
//! selection policy that picks which peaks get annotated.

use crate::config::{PeakSelection, PeakSettings};
use crate::data::model::{Peak, PeakSet};
use crate::error::AnalysisError;

/// Peak detection thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakFinder {
    /// Minimum prominence a peak needs; `None` accepts any.
    prominence: Option<f64>,
    /// Minimum index distance between accepted peaks.
    distance: usize,
}

impl Default for PeakFinder {
    fn default() -> Self {
        Self {
            prominence: None,
            distance: 1,
        }
    }
}

impl PeakFinder {
    pub fn from_settings(settings: &PeakSettings) -> Self {
        let finder = Self::default().with_distance(settings.distance);
        match settings.prominence {
            Some(p) => finder.with_prominence(p),
            None => finder,
        }
    }

    /// Set the minimum prominence
    pub fn with_prominence(mut self, prominence: f64) -> Self {
        self.prominence = Some(prominence);
        self
    }

    /// Set minimum distance between peaks
    pub fn with_distance(mut self, distance: usize) -> Self {
        self.distance = distance.max(1);
        self
    }

    /// Indices of accepted peaks in ascending order.
    ///
    /// Distance filtering runs first and favours higher peaks; prominence
    /// is then evaluated on the survivors against the full series.
    pub fn find(&self, y: &[f64]) -> Vec<usize> {
        let mut peaks = local_maxima(y);
        if self.distance > 1 {
            peaks = select_by_distance(&peaks, y, self.distance);
        }
        if let Some(min_prominence) = self.prominence {
            peaks.retain(|&p| prominence(y, p) >= min_prominence);
        }
        peaks
    }

    /// Detect peaks in `y` and apply `selection`.
    ///
    /// `x` supplies the coordinate stored with each peak and must have the
    /// same length as `y`.
    pub fn select(
        &self,
        x: &[f64],
        y: &[f64],
        selection: PeakSelection,
    ) -> Result<PeakSet, AnalysisError> {
        let peak_at = |index: usize, rank: Option<usize>| Peak {
            index,
            x: x[index],
            y: y[index],
            rank,
        };
        let ranked = |mut candidates: Vec<usize>, n: usize| {
            candidates.sort_by(|&a, &b| y[b].total_cmp(&y[a]).then(a.cmp(&b)));
            let peaks = candidates
                .into_iter()
                .take(n)
                .enumerate()
                .map(|(r, i)| peak_at(i, Some(r + 1)))
                .collect();
            PeakSet { peaks, global_max: None }
        };

        match selection {
            PeakSelection::None => return Ok(PeakSet::default()),
            // Every bin but DC competes; thresholds do not apply.
            PeakSelection::TopBins { n } => {
                return if y.len() < 2 {
                    Err(AnalysisError::NoPeaks)
                } else {
                    Ok(ranked((1..y.len()).collect(), n))
                };
            }
            _ => {}
        }

        let accepted = self.find(y);
        if accepted.is_empty() {
            return Err(AnalysisError::NoPeaks);
        }

        match selection {
            PeakSelection::None | PeakSelection::TopBins { .. } => Ok(PeakSet::default()),
            PeakSelection::TopN { n } => Ok(ranked(accepted, n)),
            PeakSelection::NeighborWindow { each_side } => {
                let global = argmax(y).ok_or(AnalysisError::NoPeaks)?;
                let position = accepted
                    .iter()
                    .position(|&p| p == global)
                    .ok_or(AnalysisError::GlobalMaxNotInPeaks { index: global })?;

                let start = position.saturating_sub(each_side);
                let end = (position + each_side + 1).min(accepted.len());
                let peaks = accepted[start..end]
                    .iter()
                    .map(|&i| peak_at(i, None))
                    .collect();
                Ok(PeakSet { peaks, global_max: Some(global) })
            }
        }
    }
}

/// First index of the largest value.
pub fn argmax(y: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &v) in y.iter().enumerate() {
        match best {
            Some(b) if v <= y[b] => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Samples higher than their left neighbour and higher than the first
/// differing sample to their right. A flat top reports its middle sample.
/// The first and last samples are never peaks.
fn local_maxima(y: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if y.len() < 3 {
        return peaks;
    }
    let last = y.len() - 1;
    let mut i = 1;
    while i < last {
        if y[i - 1] < y[i] {
            let mut ahead = i + 1;
            while ahead < last && y[ahead] == y[i] {
                ahead += 1;
            }
            if y[ahead] < y[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Drop peaks closer than `distance` to a higher kept peak.
fn select_by_distance(peaks: &[usize], y: &[f64], distance: usize) -> Vec<usize> {
    let n = peaks.len();
    let mut keep = vec![true; n];

    // Highest first; among equal heights the later peak wins.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| y[peaks[a]].total_cmp(&y[peaks[b]]));

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }
        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = j + 1;
        while k < n && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

/// Height of `y[peak]` above the higher of its two bases. Each base is the
/// minimum reached walking outward until a strictly higher sample or the
/// series boundary.
fn prominence(y: &[f64], peak: usize) -> f64 {
    let height = y[peak];

    let mut left_min = height;
    for &v in y[..=peak].iter().rev() {
        if v > height {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = height;
    for &v in &y[peak..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }

    height - left_min.max(right_min)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic pseudo-random series (LCG), enough texture for many peaks.
    fn noisy_series(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 11) as f64 / (1u64 << 53) as f64) * 10.0
            })
            .collect()
    }

    #[test]
    fn test_local_maxima_basic_and_plateau() {
        let y = [0.0, 2.0, 1.0, 3.0, 3.0, 3.0, 0.0, 5.0];
        // Last sample is a boundary, never a peak; plateau reports its middle.
        assert_eq!(local_maxima(&y), vec![1, 4]);

        let rising_plateau = [0.0, 1.0, 1.0, 2.0, 0.0];
        assert_eq!(local_maxima(&rising_plateau), vec![3]);

        assert!(local_maxima(&[1.0, 2.0]).is_empty());
    }

    #[test]
    fn test_distance_keeps_higher_peak() {
        let y = [0.0, 5.0, 0.0, 7.0, 0.0, 4.0, 0.0, 0.0, 0.0, 6.0, 0.0];
        let finder = PeakFinder::default().with_distance(3);
        assert_eq!(finder.find(&y), vec![3, 9]);
    }

    #[test]
    fn test_peaks_never_closer_than_distance() {
        for seed in 1..6u64 {
            let y = noisy_series(2000, seed);
            for distance in [1usize, 2, 5, 17, 100, 1000] {
                let peaks = PeakFinder::default().with_distance(distance).find(&y);
                assert!(!peaks.is_empty());
                for w in peaks.windows(2) {
                    assert!(
                        w[1] - w[0] >= distance,
                        "seed {seed}, distance {distance}: {} and {}",
                        w[0],
                        w[1]
                    );
                }
            }
        }
    }

    #[test]
    fn test_prominence_values() {
        let y = [0.0, 10.0, 4.0, 6.0, 1.0, 8.0, 0.0];
        assert_eq!(prominence(&y, 1), 10.0);
        // Walk left stops at 10, min 4; walk right stops at 8, min 1.
        assert_eq!(prominence(&y, 3), 2.0);
        assert_eq!(prominence(&y, 5), 7.0);

        let finder = PeakFinder::default().with_prominence(5.0);
        assert_eq!(finder.find(&y), vec![1, 5]);
    }

    #[test]
    fn test_top_n_ranks_by_height() {
        let x: Vec<f64> = (0..9).map(|i| i as f64 * 10.0).collect();
        let y = [0.0, 3.0, 0.0, 9.0, 0.0, 5.0, 0.0, 7.0, 0.0];
        let set = PeakFinder::default()
            .select(&x, &y, PeakSelection::TopN { n: 3 })
            .unwrap();
        assert_eq!(set.indices(), vec![3, 7, 5]);
        assert_eq!(set.peaks[0].rank, Some(1));
        assert_eq!(set.peaks[2].x, 50.0);
        assert_eq!(set.global_max, None);

        let all = PeakFinder::default()
            .select(&x, &y, PeakSelection::TopN { n: 10 })
            .unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn test_neighbor_window_centred() {
        // Peaks at 1,3,5,7,9,11,13; global max at 7.
        let y = [
            0.0, 1.0, 0.0, 2.0, 0.0, 3.0, 0.0, 9.0, 0.0, 4.0, 0.0, 5.0, 0.0, 6.0, 0.0,
        ];
        let x: Vec<f64> = (0..y.len()).map(|i| 1550.0 + i as f64 * 0.01).collect();
        let set = PeakFinder::default()
            .select(&x, &y, PeakSelection::NeighborWindow { each_side: 2 })
            .unwrap();
        assert_eq!(set.indices(), vec![3, 5, 7, 9, 11]);
        assert_eq!(set.global_max, Some(7));
    }

    #[test]
    fn test_neighbor_window_at_boundaries() {
        let y = [0.0, 9.0, 0.0, 2.0, 0.0, 3.0, 0.0, 4.0, 0.0];
        let x: Vec<f64> = (0..y.len()).map(|i| i as f64).collect();
        let set = PeakFinder::default()
            .select(&x, &y, PeakSelection::NeighborWindow { each_side: 2 })
            .unwrap();
        assert_eq!(set.indices(), vec![1, 3, 5]);

        let y = [0.0, 2.0, 0.0, 9.0, 0.0];
        let x: Vec<f64> = (0..y.len()).map(|i| i as f64).collect();
        let set = PeakFinder::default()
            .select(&x, &y, PeakSelection::NeighborWindow { each_side: 2 })
            .unwrap();
        assert_eq!(set.indices(), vec![1, 3]);
        assert!(set.indices().contains(&set.global_max.unwrap()));
    }

    #[test]
    fn test_neighbor_window_global_max_not_a_peak() {
        // The largest value sits on the boundary, so it is not a local maximum.
        let y = [10.0, 0.0, 3.0, 0.0, 4.0, 0.0];
        let x: Vec<f64> = (0..y.len()).map(|i| i as f64).collect();
        let err = PeakFinder::default()
            .select(&x, &y, PeakSelection::NeighborWindow { each_side: 2 })
            .unwrap_err();
        assert_eq!(err, AnalysisError::GlobalMaxNotInPeaks { index: 0 });
    }

    #[test]
    fn test_no_peaks_in_flat_or_monotonic_series() {
        let x: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let flat = vec![-60.0; 50];
        let ramp: Vec<f64> = x.clone();
        for y in [flat, ramp] {
            assert_eq!(
                PeakFinder::default().select(&x, &y, PeakSelection::TopN { n: 3 }),
                Err(AnalysisError::NoPeaks)
            );
        }
    }

    #[test]
    fn test_top_bins_ranks_edges_and_skips_dc() {
        // Falling from DC: no local maxima, but every bin after the first counts.
        let y = [50.0, 9.0, 7.0, 5.0, 3.0, 8.5];
        let x: Vec<f64> = (0..y.len()).map(|i| i as f64 * 2.0).collect();
        let set = PeakFinder::default()
            .select(&x, &y, PeakSelection::TopBins { n: 3 })
            .unwrap();
        assert_eq!(set.indices(), vec![1, 5, 2]);
        assert_eq!(set.peaks[1].x, 10.0);
        assert_eq!(set.peaks[2].rank, Some(3));

        let finder = PeakFinder::from_settings(&PeakSettings {
            prominence: Some(100.0),
            distance: 50,
            selection: PeakSelection::TopBins { n: 1 },
        });
        let set = finder.select(&x, &y, PeakSelection::TopBins { n: 1 }).unwrap();
        assert_eq!(set.indices(), vec![1]);
    }

    #[test]
    fn test_top_bins_needs_a_bin_past_dc() {
        assert_eq!(
            PeakFinder::default().select(&[0.0], &[4.0], PeakSelection::TopBins { n: 5 }),
            Err(AnalysisError::NoPeaks)
        );
    }

    #[test]
    fn test_from_settings_applies_thresholds() {
        let settings = PeakSettings {
            prominence: Some(5.0),
            distance: 0,
            selection: PeakSelection::TopN { n: 2 },
        };
        let finder = PeakFinder::from_settings(&settings);
        assert_eq!(finder, PeakFinder::default().with_prominence(5.0).with_distance(1));
        assert_eq!(finder.find(&[0.0, 10.0, 4.0, 6.0, 1.0, 8.0, 0.0]), vec![1, 5]);
    }

    #[test]
    fn test_argmax_first_occurrence() {
        assert_eq!(argmax(&[1.0, 3.0, 3.0, 2.0]), Some(1));
        assert_eq!(argmax(&[]), None);
    }
}
