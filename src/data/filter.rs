use std::collections::HashSet;

use super::loader::RawRow;
use crate::error::AnalysisError;

// ---------------------------------------------------------------------------
// Row cleaning: coercion failures and duplicate x values
// ---------------------------------------------------------------------------

/// Row accounting for one parsed file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Rows seen after the skipped header block.
    pub read: usize,
    /// Rows dropped because a required field was missing or not numeric.
    pub malformed: usize,
    /// Rows dropped because their x value was already seen.
    pub duplicates: usize,
    pub kept: usize,
}

/// Drop malformed rows, then (optionally) repeated x values.
///
/// A row passes when:
/// * every required field parsed to a finite number, and
/// * `dedup_x` is off, or its x value has not appeared in an earlier kept row.
///
/// Order is preserved. Returned rows hold x first, then each y in role order.
pub fn clean_rows(rows: Vec<RawRow>, dedup_x: bool) -> (Vec<Vec<f64>>, ParseStats) {
    let mut stats = ParseStats { read: rows.len(), ..Default::default() };
    let mut seen: HashSet<u64> = HashSet::new();
    let mut kept = Vec::with_capacity(rows.len());

    for raw in rows {
        let Some(values) = raw.into_iter().collect::<Option<Vec<f64>>>() else {
            stats.malformed += 1;
            continue;
        };
        // +0.0 and -0.0 are the same time stamp.
        if dedup_x && !seen.insert((values[0] + 0.0).to_bits()) {
            stats.duplicates += 1;
            continue;
        }
        kept.push(values);
    }

    stats.kept = kept.len();
    (kept, stats)
}

/// A trace needs two samples and a non-zero first interval.
pub fn check_usable(rows: &[Vec<f64>]) -> Result<(), AnalysisError> {
    match rows {
        [first, second, ..] => {
            if second[0] - first[0] == 0.0 {
                Err(AnalysisError::ZeroSpacing)
            } else {
                Ok(())
            }
        }
        _ => Err(AnalysisError::InsufficientData { rows: rows.len() }),
    }
}
