use std::fmt;

// ---------------------------------------------------------------------------
// Channel – one y column of an instrument export
// ---------------------------------------------------------------------------

/// A named y-series sharing the x axis of its [`Trace`].
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub label: String,
    pub values: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Trace – the cleaned content of one input file
// ---------------------------------------------------------------------------

/// Ordered samples read from one instrument export file.
///
/// `x` is time, frequency or wavelength depending on the instrument. Every
/// channel has exactly `x.len()` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub x: Vec<f64>,
    pub channels: Vec<Channel>,
}

impl Trace {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// The first y-series. Loaders never produce a trace without one.
    pub fn primary(&self) -> &[f64] {
        self.channels
            .first()
            .map(|c| c.values.as_slice())
            .unwrap_or(&[])
    }

    /// Spacing between the first two samples, if there are two.
    pub fn sample_spacing(&self) -> Option<f64> {
        match self.x.as_slice() {
            [a, b, ..] => Some(b - a),
            _ => None,
        }
    }

    /// `(x, y)` pairs of one channel.
    pub fn points(&self, channel: usize) -> Vec<(f64, f64)> {
        self.channels
            .get(channel)
            .map(|c| self.x.iter().copied().zip(c.values.iter().copied()).collect())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Spectrum – non-negative half of a DFT
// ---------------------------------------------------------------------------

/// Magnitude-vs-frequency series derived from a [`Trace`].
///
/// `frequency` is already scaled to the display unit (MHz, GHz, …).
/// `magnitude` holds one vector per source channel, in the same order.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub frequency: Vec<f64>,
    pub magnitude: Vec<Vec<f64>>,
}

impl Spectrum {
    pub fn primary(&self) -> &[f64] {
        self.magnitude.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// Peaks
// ---------------------------------------------------------------------------

/// A selected local maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Sample index in the analysed series.
    pub index: usize,
    pub x: f64,
    pub y: f64,
    /// 1-based rank when the selection policy ranks by magnitude.
    pub rank: Option<usize>,
}

impl fmt::Display for Peak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rank {
            Some(r) => write!(f, "#{r} [{}] ({:.4}, {:.4})", self.index, self.x, self.y),
            None => write!(f, "[{}] ({:.4}, {:.4})", self.index, self.x, self.y),
        }
    }
}

/// The peaks chosen for annotation in one series.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakSet {
    /// Ordered by rank for top-N selection, by x for neighbor windows.
    pub peaks: Vec<Peak>,
    /// Index of the series' global maximum, when the policy looked it up.
    pub global_max: Option<usize>,
}

impl PeakSet {
    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    #[cfg(test)]
    pub fn indices(&self) -> Vec<usize> {
        self.peaks.iter().map(|p| p.index).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace() -> Trace {
        Trace {
            x: vec![0.0, 0.5, 1.0],
            channels: vec![Channel {
                label: "v".into(),
                values: vec![1.0, 2.0, 3.0],
            }],
        }
    }

    #[test]
    fn test_sample_spacing() {
        assert_eq!(trace().sample_spacing(), Some(0.5));

        let single = Trace {
            x: vec![1.0],
            channels: vec![Channel { label: "v".into(), values: vec![1.0] }],
        };
        assert_eq!(single.sample_spacing(), None);
    }

    #[test]
    fn test_points_zip_x_and_channel() {
        let t = trace();
        assert_eq!(t.points(0), vec![(0.0, 1.0), (0.5, 2.0), (1.0, 3.0)]);
        assert!(t.points(1).is_empty());
    }

    #[test]
    fn test_peak_display() {
        let p = Peak { index: 3, x: 1.5, y: -2.25, rank: Some(1) };
        assert_eq!(p.to_string(), "#1 [3] (1.5000, -2.2500)");
    }
}
